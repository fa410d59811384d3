//! Interactive navigation as a pure state machine.
//!
//! [`App::handle`] is the only mutator. It maps the current view and one
//! event to the next view plus a [`Command`] for the runtime to carry out;
//! fetches run elsewhere and report back through events.

use classroom_core::entities::{
    Announcement, Course, CourseRef, CourseWork, GradeEntry, ResourceKind,
};
use classroom_core::Error;

pub const LOGIN_HINT: &str = "Please authenticate first using 'gc-cli auth login'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    Open(ResourceKind),
    Quit,
}

impl MenuEntry {
    pub fn label(self) -> &'static str {
        match self {
            MenuEntry::Open(kind) => kind.label(),
            MenuEntry::Quit => "Quit",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MenuEntry::Open(ResourceKind::Courses) => "View your enrolled classes",
            MenuEntry::Open(ResourceKind::Coursework) => "Assignments sorted by due date",
            MenuEntry::Open(ResourceKind::Grades) => "Grades and feedback",
            MenuEntry::Open(ResourceKind::Announcements) => "Posts from your teachers",
            MenuEntry::Quit => "Exit the application",
        }
    }
}

pub const MENU: [MenuEntry; 5] = [
    MenuEntry::Open(ResourceKind::Courses),
    MenuEntry::Open(ResourceKind::Coursework),
    MenuEntry::Open(ResourceKind::Grades),
    MenuEntry::Open(ResourceKind::Announcements),
    MenuEntry::Quit,
];

/// Items loaded for one resource view
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Courses(Vec<Course>),
    Coursework(Vec<CourseWork>),
    Grades(Vec<GradeEntry>),
    Announcements(Vec<Announcement>),
}

impl Items {
    pub fn len(&self) -> usize {
        match self {
            Items::Courses(v) => v.len(),
            Items::Coursework(v) => v.len(),
            Items::Grades(v) => v.len(),
            Items::Announcements(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    MainMenu {
        selected: usize,
    },
    ResourceList {
        kind: ResourceKind,
        items: Items,
        selected: usize,
    },
    /// Course chooser; `target` is reopened once a course is confirmed
    Picker {
        target: Option<ResourceKind>,
        courses: Vec<Course>,
        selected: usize,
    },
    Loading {
        message: String,
    },
    Error {
        message: String,
    },
    AuthRequired {
        message: String,
    },
}

/// Logical input, already decoded from raw keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Select,
    Back,
    Quit,
    Refresh,
    ChangeCourse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    Resource {
        kind: ResourceKind,
        course: Option<CourseRef>,
    },
    CoursePicker {
        then: Option<ResourceKind>,
    },
}

impl FetchTarget {
    fn loading_message(&self) -> String {
        match self {
            FetchTarget::Resource { kind, .. } => {
                format!("Loading {}...", kind.label().to_lowercase())
            }
            FetchTarget::CoursePicker { .. } => "Loading classes...".to_string(),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            FetchTarget::Resource { kind, .. } => kind.label(),
            FetchTarget::CoursePicker { .. } => "Classes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: u64,
    pub target: FetchTarget,
}

#[derive(Debug)]
pub enum Event {
    Key(Action),
    FetchCompleted { id: u64, items: Items },
    FetchFailed { id: u64, error: Error },
}

/// Work the runtime performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    None,
    Fetch(FetchRequest),
    CancelFetch,
    Exit,
}

pub struct App {
    view: ViewState,
    course: Option<CourseRef>,
    authenticated: bool,
    menu_selected: usize,
    next_fetch_id: u64,
    in_flight: Option<FetchRequest>,
}

fn step(selected: usize, len: usize, up: bool) -> usize {
    if len == 0 {
        0
    } else if up {
        selected.saturating_sub(1)
    } else {
        (selected + 1).min(len - 1)
    }
}

impl App {
    pub fn new(authenticated: bool, course: Option<CourseRef>) -> Self {
        Self {
            view: ViewState::MainMenu { selected: 0 },
            course,
            authenticated,
            menu_selected: 0,
            next_fetch_id: 1,
            in_flight: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn course(&self) -> Option<&CourseRef> {
        self.course.as_ref()
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> Option<&FetchRequest> {
        self.in_flight.as_ref()
    }

    pub fn handle(&mut self, event: Event) -> Command {
        match event {
            Event::Key(action) => self.on_action(action),
            Event::FetchCompleted { id, items } => self.on_completed(id, items),
            Event::FetchFailed { id, error } => self.on_failed(id, error),
        }
    }

    fn on_action(&mut self, action: Action) -> Command {
        if matches!(action, Action::Back | Action::Quit) {
            if matches!(self.view, ViewState::MainMenu { .. }) {
                return Command::Exit;
            }
            return self.to_main_menu();
        }

        match &mut self.view {
            ViewState::MainMenu { selected } => match action {
                Action::Up | Action::Down => {
                    *selected = step(*selected, MENU.len(), action == Action::Up);
                    self.menu_selected = *selected;
                    Command::None
                }
                Action::Select => match MENU[*selected] {
                    MenuEntry::Open(kind) => self.open(kind),
                    MenuEntry::Quit => Command::Exit,
                },
                Action::ChangeCourse => self.open_picker(None),
                _ => Command::None,
            },

            ViewState::ResourceList {
                kind,
                items,
                selected,
            } => match action {
                Action::Up | Action::Down => {
                    *selected = step(*selected, items.len(), action == Action::Up);
                    Command::None
                }
                Action::Refresh => {
                    let kind = *kind;
                    self.open(kind)
                }
                Action::ChangeCourse if kind.requires_course() => {
                    let kind = *kind;
                    self.open_picker(Some(kind))
                }
                Action::Select => match items {
                    Items::Courses(courses) if !courses.is_empty() => {
                        let picked = CourseRef::from(&courses[*selected]);
                        self.course = Some(picked);
                        self.open(ResourceKind::Coursework)
                    }
                    _ => Command::None,
                },
                _ => Command::None,
            },

            ViewState::Picker {
                target,
                courses,
                selected,
            } => match action {
                Action::Up | Action::Down => {
                    *selected = step(*selected, courses.len(), action == Action::Up);
                    Command::None
                }
                Action::Select if !courses.is_empty() => {
                    let target = *target;
                    self.course = Some(CourseRef::from(&courses[*selected]));
                    match target {
                        Some(kind) => self.open(kind),
                        None => self.to_main_menu(),
                    }
                }
                Action::Refresh => {
                    let target = *target;
                    self.open_picker(target)
                }
                _ => Command::None,
            },

            ViewState::Error { .. } | ViewState::AuthRequired { .. } => match action {
                Action::Select => self.to_main_menu(),
                _ => Command::None,
            },

            ViewState::Loading { .. } => Command::None,
        }
    }

    /// Enter a resource view, routing through the picker when it needs a course.
    fn open(&mut self, kind: ResourceKind) -> Command {
        if !self.authenticated {
            self.view = ViewState::AuthRequired {
                message: LOGIN_HINT.to_string(),
            };
            return Command::None;
        }

        if kind.requires_course() && self.course.is_none() {
            return self.open_picker(Some(kind));
        }

        self.start_fetch(FetchTarget::Resource {
            kind,
            course: self.course.clone(),
        })
    }

    fn open_picker(&mut self, then: Option<ResourceKind>) -> Command {
        if !self.authenticated {
            self.view = ViewState::AuthRequired {
                message: LOGIN_HINT.to_string(),
            };
            return Command::None;
        }
        self.start_fetch(FetchTarget::CoursePicker { then })
    }

    fn start_fetch(&mut self, target: FetchTarget) -> Command {
        let request = FetchRequest {
            id: self.next_fetch_id,
            target,
        };
        self.next_fetch_id += 1;
        self.view = ViewState::Loading {
            message: request.target.loading_message(),
        };
        self.in_flight = Some(request.clone());
        Command::Fetch(request)
    }

    fn to_main_menu(&mut self) -> Command {
        self.view = ViewState::MainMenu {
            selected: self.menu_selected,
        };
        match self.in_flight.take() {
            Some(_) => Command::CancelFetch,
            None => Command::None,
        }
    }

    /// The in-flight request matching `id`, cleared; `None` for stale results.
    fn settle(&mut self, id: u64) -> Option<FetchRequest> {
        match &self.in_flight {
            Some(request) if request.id == id => self.in_flight.take(),
            _ => None,
        }
    }

    fn on_completed(&mut self, id: u64, items: Items) -> Command {
        let Some(request) = self.settle(id) else {
            return Command::None;
        };

        self.view = match (request.target, items) {
            (FetchTarget::CoursePicker { then }, Items::Courses(courses)) => ViewState::Picker {
                target: then,
                courses,
                selected: 0,
            },
            (FetchTarget::Resource { kind, .. }, items) => ViewState::ResourceList {
                kind,
                items,
                selected: 0,
            },
            (FetchTarget::CoursePicker { .. }, _) => ViewState::Error {
                message: "Unexpected response while loading classes".to_string(),
            },
        };
        Command::None
    }

    fn on_failed(&mut self, id: u64, error: Error) -> Command {
        let Some(request) = self.settle(id) else {
            return Command::None;
        };

        self.view = if error.requires_reauthentication() {
            self.authenticated = false;
            ViewState::AuthRequired {
                message: format!("{}. {}", error, LOGIN_HINT),
            }
        } else {
            ViewState::Error {
                message: format!(
                    "Failed to load {}: {}",
                    request.target.description().to_lowercase(),
                    error
                ),
            }
        };
        Command::None
    }
}
