use classroom_core::entities::{Announcement, Course, CourseWork, StudentSubmission};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// One page of a list response
pub trait Paginated: DeserializeOwned {
    type Item;

    /// Items on this page plus the cursor for the next one, if any
    fn into_page(self) -> (Vec<Self::Item>, Option<String>);
}

macro_rules! list_response {
    ($name:ident, $item:ty, $field:literal) => {
        #[derive(Debug, Deserialize, Default)]
        #[serde(rename_all = "camelCase", default)]
        pub struct $name {
            #[serde(rename = $field)]
            pub items: Vec<$item>,
            pub next_page_token: Option<String>,
        }

        impl Paginated for $name {
            type Item = $item;

            fn into_page(self) -> (Vec<$item>, Option<String>) {
                (
                    self.items,
                    self.next_page_token.filter(|t| !t.is_empty()),
                )
            }
        }
    };
}

list_response!(CourseList, Course, "courses");
list_response!(CourseWorkList, CourseWork, "courseWork");
list_response!(SubmissionList, StudentSubmission, "studentSubmissions");
list_response!(AnnouncementList, Announcement, "announcements");
