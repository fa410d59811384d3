use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use super::state::{App, Items, ViewState, MENU};
use crate::present::{
    course_subtitle, date_label, due_label, grade_label, headline, points_label, work_status,
};

const TITLE: &str = "gc-cli";
const ROW_WIDTH: usize = 60;

pub fn draw(frame: &mut Frame, app: &App) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    let context = match app.course() {
        Some(course) => format!("Class: {}", course.name),
        None => "No class selected".to_string(),
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                TITLE,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(context, Style::default().fg(Color::Gray)),
        ]))
        .block(Block::default().borders(Borders::ALL)),
        header,
    );

    match app.view() {
        ViewState::MainMenu { selected } => {
            let rows: Vec<String> = MENU.iter().map(|entry| entry.label().to_string()).collect();
            let detail = vec![Line::from(MENU[*selected].description())];
            draw_list(frame, body, "Menu", rows, *selected, detail);
        }
        ViewState::ResourceList {
            kind,
            items,
            selected,
        } => {
            let now = Utc::now();
            let detail = if items.is_empty() {
                vec![Line::from(format!(
                    "No {} to show.",
                    kind.label().to_lowercase()
                ))]
            } else {
                item_detail(items, *selected, now)
            };
            let title = format!("{} ({})", kind.label(), items.len());
            draw_list(
                frame,
                body,
                &title,
                item_rows(items, now),
                *selected,
                detail,
            );
        }
        ViewState::Picker {
            courses, selected, ..
        } => {
            let rows = courses.iter().map(|c| c.name.clone()).collect();
            let detail = courses
                .get(*selected)
                .map(|c| vec![Line::from(course_subtitle(c))])
                .unwrap_or_default();
            draw_list(frame, body, "Choose a class", rows, *selected, detail);
        }
        ViewState::Loading { message } => {
            draw_message(frame, body, "Loading", message, Color::Yellow);
        }
        ViewState::Error { message } => {
            draw_message(frame, body, "Error", message, Color::Red);
        }
        ViewState::AuthRequired { message } => {
            draw_message(frame, body, "Authentication required", message, Color::Red);
        }
    }

    frame.render_widget(
        Paragraph::new(hints(app.view())).block(Block::default().borders(Borders::ALL)),
        footer,
    );
}

fn draw_list(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: Vec<String>,
    selected: usize,
    detail: Vec<Line<'static>>,
) {
    let [list_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);

    let mut state = ListState::default();
    let empty = rows.is_empty();
    if !empty {
        state.select(Some(selected.min(rows.len() - 1)));
    }

    let mut items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
    if empty {
        items.push(ListItem::new("(nothing here)"));
    }

    let list = List::new(items)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut state);

    frame.render_widget(
        Paragraph::new(detail)
            .wrap(Wrap { trim: false })
            .block(Block::default().title("Details").borders(Borders::ALL)),
        detail_area,
    );
}

fn draw_message(frame: &mut Frame, area: Rect, title: &str, message: &str, color: Color) {
    frame.render_widget(
        Paragraph::new(message.to_string())
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true })
            .block(Block::default().title(title.to_string()).borders(Borders::ALL)),
        area,
    );
}

fn hints(view: &ViewState) -> &'static str {
    match view {
        ViewState::MainMenu { .. } => "j/k: move | Enter: open | c: change class | q: quit",
        ViewState::ResourceList { .. } => {
            "j/k: move | Enter: open | r: reload | c: change class | Esc: back | q: menu"
        }
        ViewState::Picker { .. } => "j/k: move | Enter: choose | r: reload | Esc: back",
        ViewState::Loading { .. } => "Esc: cancel",
        ViewState::Error { .. } | ViewState::AuthRequired { .. } => "Enter/Esc: back to menu",
    }
}

/// One line per item for the list pane
pub fn item_rows(items: &Items, now: DateTime<Utc>) -> Vec<String> {
    match items {
        Items::Courses(courses) => courses.iter().map(|c| c.name.clone()).collect(),
        Items::Coursework(work) => work
            .iter()
            .map(|w| {
                format!(
                    "{}  [{}] {}",
                    headline(&w.title, ROW_WIDTH),
                    work_status(w, now),
                    due_label(w)
                )
            })
            .collect(),
        Items::Grades(grades) => grades
            .iter()
            .map(|g| format!("{}  {}", headline(&g.assignment, ROW_WIDTH), grade_label(g)))
            .collect(),
        Items::Announcements(posts) => posts
            .iter()
            .map(|a| {
                format!(
                    "{}  {}",
                    date_label(a.creation_time),
                    headline(&a.text, ROW_WIDTH)
                )
            })
            .collect(),
    }
}

fn field(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{}: ", label),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

/// Detail pane contents for the highlighted item
pub fn item_detail(items: &Items, selected: usize, now: DateTime<Utc>) -> Vec<Line<'static>> {
    match items {
        Items::Courses(courses) => courses
            .get(selected)
            .map(|c| {
                let mut lines = vec![field("Name", c.name.clone())];
                let subtitle = course_subtitle(c);
                if !subtitle.is_empty() {
                    lines.push(field("Section", subtitle));
                }
                if let Some(heading) = &c.description_heading {
                    lines.push(field("About", heading.clone()));
                }
                if let Some(link) = &c.alternate_link {
                    lines.push(field("Link", link.clone()));
                }
                lines.push(Line::from(""));
                lines.push(Line::from("Enter: open classwork"));
                lines
            })
            .unwrap_or_default(),
        Items::Coursework(work) => work
            .get(selected)
            .map(|w| {
                let mut lines = vec![
                    field("Title", w.title.clone()),
                    field("Due", due_label(w)),
                    field("Status", work_status(w, now).to_string()),
                    field("Points", points_label(w.max_points)),
                ];
                if let Some(link) = &w.alternate_link {
                    lines.push(field("Link", link.clone()));
                }
                if let Some(description) = &w.description {
                    lines.push(Line::from(""));
                    lines.extend(description.lines().map(|l| Line::from(l.to_string())));
                }
                lines
            })
            .unwrap_or_default(),
        Items::Grades(grades) => grades
            .get(selected)
            .map(|g| {
                vec![
                    field("Assignment", g.assignment.clone()),
                    field("Grade", grade_label(g)),
                    field("Feedback", g.feedback.to_string()),
                ]
            })
            .unwrap_or_default(),
        Items::Announcements(posts) => posts
            .get(selected)
            .map(|a| {
                let mut lines = vec![field("Posted", date_label(a.creation_time))];
                if let Some(link) = &a.alternate_link {
                    lines.push(field("Link", link.clone()));
                }
                lines.push(Line::from(""));
                lines.extend(a.text.lines().map(|l| Line::from(l.to_string())));
                lines
            })
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use classroom_core::entities::{CourseWork, Date, Feedback, GradeEntry};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_main_menu_lists_every_entry() {
        let text = screen_text(&App::new(true, None));
        for entry in MENU {
            assert!(text.contains(entry.label()), "missing {}", entry.label());
        }
        assert!(text.contains("No class selected"));
    }

    #[test]
    fn test_coursework_rows_show_status_and_due() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let items = Items::Coursework(vec![CourseWork {
            title: "Lab report".into(),
            due_date: Some(Date {
                year: 2024,
                month: 5,
                day: 20,
            }),
            ..CourseWork::default()
        }]);

        let rows = item_rows(&items, now);
        assert_eq!(rows, vec!["Lab report  [Overdue] 2024/05/20".to_string()]);
    }

    #[test]
    fn test_grade_detail() {
        let items = Items::Grades(vec![GradeEntry {
            course_work_id: "w1".into(),
            assignment: "Quiz".into(),
            grade: 9.0,
            max_points: Some(10.0),
            feedback: Feedback::Returned,
        }]);

        let detail = item_detail(&items, 0, Utc::now());
        let text: Vec<String> = detail.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            text,
            vec![
                "Assignment: Quiz".to_string(),
                "Grade: 9 / 10".to_string(),
                "Feedback: Returned".to_string(),
            ]
        );
        assert!(item_detail(&items, 5, Utc::now()).is_empty());
    }
}
