use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::state::Action;

/// Decode a key press into a navigation action. Releases and repeats of
/// unbound keys yield `None`.
pub fn key_action(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(Action::Select),
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => {
            Some(Action::Back)
        }
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('c') => Some(Action::ChangeCourse),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use rstest::rstest;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[rstest]
    #[case(KeyCode::Up, Some(Action::Up))]
    #[case(KeyCode::Char('k'), Some(Action::Up))]
    #[case(KeyCode::Down, Some(Action::Down))]
    #[case(KeyCode::Char('j'), Some(Action::Down))]
    #[case(KeyCode::Enter, Some(Action::Select))]
    #[case(KeyCode::Esc, Some(Action::Back))]
    #[case(KeyCode::Backspace, Some(Action::Back))]
    #[case(KeyCode::Char('q'), Some(Action::Quit))]
    #[case(KeyCode::Char('r'), Some(Action::Refresh))]
    #[case(KeyCode::Char('c'), Some(Action::ChangeCourse))]
    #[case(KeyCode::Char('x'), None)]
    #[case(KeyCode::Tab, None)]
    fn test_key_bindings(#[case] code: KeyCode, #[case] expected: Option<Action>) {
        assert_eq!(key_action(press(code)), expected);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_action(key), Some(Action::Quit));
    }

    #[test]
    fn test_release_is_ignored() {
        let key = KeyEvent {
            code: KeyCode::Enter,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(key_action(key), None);
    }
}
