//! Keyboard input dispatch — overlays → text editing → global keys → step forms.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use stockml_pipeline::{Step, Transition};

use crate::app::{AppState, Overlay};
use crate::forms::{LoadForm, LoadMode};

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    // 1. Overlays consume input first.
    match app.overlay {
        Overlay::Welcome | Overlay::Help => {
            app.overlay = Overlay::None;
            return;
        }
        Overlay::ErrorHistory => {
            handle_error_overlay(app, key);
            return;
        }
        Overlay::None => {}
    }

    // 2. An active text field takes every printable key.
    if app.editing {
        handle_text_edit(app, key);
        return;
    }

    // 3. Global keys.
    match key.code {
        KeyCode::Char('q') => {
            app.running = false;
            return;
        }
        KeyCode::Char(c @ '0'..='7') => {
            if let Some(step) = c.to_digit(10).and_then(|d| Step::from_index(d as usize)) {
                app.navigate(Transition::Jump(step));
            }
            return;
        }
        KeyCode::Char('n') | KeyCode::Tab => {
            app.navigate(Transition::Continue);
            return;
        }
        KeyCode::Char('R') => {
            app.navigate(Transition::Restart);
            return;
        }
        KeyCode::Char('p') => {
            app.cycle_palette();
            return;
        }
        KeyCode::Char('E') => {
            app.error_scroll = 0;
            app.overlay = Overlay::ErrorHistory;
            return;
        }
        KeyCode::Char('?') => {
            app.overlay = Overlay::Help;
            return;
        }
        KeyCode::Enter => {
            app.run_step();
            return;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let rows = form_rows(app);
            if app.forms.cursor + 1 < rows {
                app.forms.cursor += 1;
            }
            return;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.forms.cursor = app.forms.cursor.saturating_sub(1);
            return;
        }
        _ => {}
    }

    // 4. Step-specific keys.
    match app.current_step() {
        Step::Load => handle_load_key(app, key),
        Step::FeatureEngineer => handle_feature_key(app, key),
        Step::Split => {
            if let Some(dir) = direction(key.code) {
                app.forms.split.adjust(app.forms.cursor, dir);
            }
        }
        Step::Train => {
            if let Some(dir) = direction(key.code) {
                app.forms.train.adjust(app.forms.cursor, dir);
                app.forms.cursor = app.forms.cursor.min(app.forms.train.rows() - 1);
            }
        }
        Step::Visualize => handle_visualize_key(app, key),
        Step::Welcome | Step::Preprocess | Step::Evaluate => {}
    }
}

/// Rows the cursor can move over on the current step.
fn form_rows(app: &AppState) -> usize {
    match app.current_step() {
        Step::Load => LoadForm::FIELDS.len(),
        Step::FeatureEngineer => app.forms.features.rows(),
        Step::Split => 2,
        Step::Train => app.forms.train.rows(),
        Step::Visualize => app.forms.predict.values.len(),
        Step::Welcome | Step::Preprocess | Step::Evaluate => 0,
    }
}

fn direction(code: KeyCode) -> Option<i32> {
    match code {
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('-') => Some(-1),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('+') => Some(1),
        _ => None,
    }
}

fn handle_error_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('E') => {
            app.overlay = Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.error_scroll + 1 < app.error_history.len() {
                app.error_scroll += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.error_scroll = app.error_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_text_edit(app: &mut AppState, key: KeyEvent) {
    let cursor = app.forms.cursor;
    match key.code {
        KeyCode::Esc | KeyCode::Enter => app.editing = false,
        KeyCode::Backspace => {
            if let Some(text) = app.forms.load.text_mut(cursor) {
                text.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(text) = app.forms.load.text_mut(cursor) {
                text.push(c);
            }
        }
        _ => {}
    }
}

fn handle_load_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char(' ') | KeyCode::Char('h') | KeyCode::Char('l') | KeyCode::Left | KeyCode::Right
            if app.forms.cursor == 0 =>
        {
            app.forms.load.toggle_mode();
        }
        KeyCode::Char('e') => {
            let field_active = match app.forms.cursor {
                1..=3 => app.forms.load.mode == LoadMode::Remote,
                4 => app.forms.load.mode == LoadMode::Upload,
                _ => false,
            };
            if field_active {
                app.editing = true;
            }
        }
        _ => {}
    }
}

fn handle_feature_key(app: &mut AppState, key: KeyEvent) {
    let row = app.forms.cursor;
    if key.code == KeyCode::Char(' ') {
        app.forms.features.toggle(row);
    } else if let Some(dir) = direction(key.code) {
        app.forms.features.adjust(row, dir);
    } else if key.code == KeyCode::Char('a') {
        let target = app.forms.features.target.clone();
        app.forms.features.selected = app
            .forms
            .features
            .columns
            .iter()
            .filter(|c| **c != target)
            .cloned()
            .collect();
    }
    app.forms.cursor = app.forms.cursor.min(app.forms.features.rows().saturating_sub(1));
}

fn handle_visualize_key(app: &mut AppState, key: KeyEvent) {
    let pipeline = &app.session.pipeline;
    match key.code {
        KeyCode::Char('v') => {
            app.forms.predict.view = app.forms.predict.view.next();
            app.forms.cursor = 0;
        }
        KeyCode::Char('m') => app.forms.predict.cycle_model(pipeline),
        KeyCode::Char('s') => app.forms.predict.toggle_scale(pipeline),
        code => {
            if let Some(dir) = direction(code) {
                let row = app.forms.cursor;
                app.forms.predict.adjust(pipeline, row, dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};
    use stockml_pipeline::PipelineConfig;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app() -> AppState {
        AppState::new(PipelineConfig::default(), None)
    }

    #[test]
    fn q_quits() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[test]
    fn digits_jump_to_steps() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Char('4')));
        assert_eq!(app.current_step(), Step::Split);
        handle_key(&mut app, press(KeyCode::Char('0')));
        assert_eq!(app.current_step(), Step::Welcome);
    }

    #[test]
    fn welcome_overlay_swallows_first_key() {
        let mut app = app();
        app.overlay = Overlay::Welcome;
        handle_key(&mut app, press(KeyCode::Char('q')));
        assert!(app.running);
        assert_eq!(app.overlay, Overlay::None);
    }

    #[test]
    fn editing_captures_q() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Char('1')));
        handle_key(&mut app, press(KeyCode::Char('j')));
        handle_key(&mut app, press(KeyCode::Char('e')));
        assert!(app.editing);
        for _ in 0..4 {
            handle_key(&mut app, press(KeyCode::Backspace));
        }
        handle_key(&mut app, press(KeyCode::Char('q')));
        handle_key(&mut app, press(KeyCode::Enter));
        assert!(app.running);
        assert!(!app.editing);
        assert_eq!(app.forms.load.symbol, "q");
    }

    #[test]
    fn split_percent_adjusts_with_arrows() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Char('4')));
        let before = app.forms.split.test_percent;
        handle_key(&mut app, press(KeyCode::Right));
        assert_eq!(app.forms.split.test_percent, before + 1);
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app();
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        handle_key(&mut app, key);
        assert!(app.running);
    }
}
