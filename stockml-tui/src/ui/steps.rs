//! One view per wizard step: the step's form on top, its artifacts below.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use stockml_core::Table;
use stockml_pipeline::{can_run, PipelineState, Step, ValueScale};

use crate::app::AppState;
use crate::forms::{FeatureForm, LoadForm, LoadMode, VizView};
use crate::theme::Theme;
use crate::ui::chart;

const PREVIEW_ROWS: usize = 5;

pub fn render(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let step = app.current_step();
    let pipeline = &app.session.pipeline;

    if step != Step::Welcome && !can_run(pipeline, step) {
        let required = step.requires().map(|s| s.label()).unwrap_or("the previous step");
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(format!("🔒 Complete {required} first."), theme.warning())),
            Line::from(Span::styled(
                format!("Press {} to go there.", step.requires().map_or(0, |s| s.index())),
                theme.muted(),
            )),
        ];
        f.render_widget(Paragraph::new(lines), area);
        return;
    }

    match step {
        Step::Welcome => render_welcome(f, area, theme),
        Step::Load => render_load(f, area, app, theme),
        Step::Preprocess => render_preprocess(f, area, pipeline, theme),
        Step::FeatureEngineer => render_features(f, area, app, theme),
        Step::Split => render_split(f, area, app, theme),
        Step::Train => render_train(f, area, app, theme),
        Step::Evaluate => render_evaluate(f, area, pipeline, theme),
        Step::Visualize => render_visualize(f, area, app, theme),
    }
}

fn field<'a>(label: &str, value: String, focused: bool, theme: &Theme) -> Line<'a> {
    let style = if focused { theme.selected() } else { theme.text() };
    Line::from(vec![
        Span::styled(format!("{label:>14}: "), theme.muted()),
        Span::styled(value, style),
    ])
}

fn header<'a>(text: &str, theme: &Theme) -> Line<'a> {
    Line::from(Span::styled(text.to_string(), theme.accent_bold()))
}

fn hint<'a>(text: &str, theme: &Theme) -> Line<'a> {
    Line::from(Span::styled(text.to_string(), theme.muted()))
}

fn check(on: bool) -> &'static str {
    if on {
        "[x]"
    } else {
        "[ ]"
    }
}

fn notices<'a>(app: &AppState, step: Step, theme: &Theme) -> Vec<Line<'a>> {
    match &app.last_outcome {
        Some(outcome) if outcome.step == step => outcome
            .notices
            .iter()
            .map(|n| Line::from(Span::styled(format!("• {n}"), theme.neutral())))
            .collect(),
        _ => Vec::new(),
    }
}

fn split_vertical(area: Rect, top: u16) -> (Rect, Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(top), Constraint::Min(0)])
        .split(area);
    (parts[0], parts[1])
}

// ── Step 0 ───────────────────────────────────────────────────────────

fn render_welcome(f: &mut Frame, area: Rect, theme: &Theme) {
    let lines = vec![
        Line::from(""),
        header("Stock price prediction, one step at a time.", theme),
        Line::from(""),
        hint("Each step unlocks the next. Re-running a step clears everything after it.", theme),
        hint("Press Enter or n to start loading data.", theme),
        Line::from(""),
        Line::from(Span::styled(
            "For learning only. Predictions here are not investment advice.",
            theme.warning(),
        )),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

// ── Step 1 ───────────────────────────────────────────────────────────

fn render_load(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let form = &app.forms.load;
    let cursor = app.forms.cursor;
    let remote = form.mode == LoadMode::Remote;
    let caret = |i: usize| if app.editing && cursor == i { "_" } else { "" };

    let mut lines = vec![
        header("Where should the prices come from?", theme),
        Line::from(""),
        field(
            LoadForm::FIELDS[0],
            if remote { "◉ Yahoo Finance  ○ Upload".into() } else { "○ Yahoo Finance  ◉ Upload".into() },
            cursor == 0,
            theme,
        ),
    ];
    let texts = [&form.symbol, &form.start, &form.end, &form.path];
    for (i, text) in texts.iter().enumerate() {
        let row = i + 1;
        let active = if row == 4 { !remote } else { remote };
        let mut line = field(LoadForm::FIELDS[row], format!("{text}{}", caret(row)), cursor == row, theme);
        if !active {
            line = line.style(theme.muted());
        }
        lines.push(line);
    }
    lines.push(Line::from(""));
    lines.push(hint("[Space]source [e]dit field [Enter]load", theme));
    if app.source.is_none() && remote {
        lines.push(Line::from(Span::styled(
            "No market data provider configured; upload a file instead.",
            theme.warning(),
        )));
    }
    lines.push(Line::from(""));
    lines.extend(notices(app, Step::Load, theme));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Step 2 ───────────────────────────────────────────────────────────

fn table_preview<'a>(table: &Table, theme: &Theme) -> Vec<Line<'a>> {
    let columns = table.columns();
    let mut lines = vec![Line::from(Span::styled(
        columns
            .iter()
            .map(|c| format!("{:>12.12}", c.name))
            .collect::<Vec<_>>()
            .join(" "),
        theme.accent(),
    ))];
    for row in 0..table.n_rows().min(PREVIEW_ROWS) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:>12.12}", c.data.display_cell(row)))
            .collect();
        lines.push(Line::from(Span::styled(cells.join(" "), theme.text())));
    }
    lines
}

fn render_preprocess(f: &mut Frame, area: Rect, pipeline: &PipelineState, theme: &Theme) {
    let mut lines = Vec::new();
    let Some(raw) = pipeline.raw() else {
        f.render_widget(Paragraph::new(hint("No data loaded.", theme)), area);
        return;
    };

    lines.push(header(
        &format!(
            "{} rows × {} columns{}",
            raw.n_rows(),
            raw.n_cols(),
            pipeline
                .dataset_hash()
                .map(|h| format!("  #{}", &h[..h.len().min(12)]))
                .unwrap_or_default()
        ),
        theme,
    ));
    if let Some(price) = pipeline.current_price() {
        lines.push(Line::from(vec![
            Span::styled("Current price ", theme.muted()),
            Span::styled(format!("{price:.2}"), theme.accent()),
        ]));
    }
    lines.push(Line::from(""));
    lines.extend(table_preview(raw, theme));
    lines.push(Line::from(""));

    match pipeline.imputation() {
        Some(report) if report.is_clean() => {
            lines.push(Line::from(Span::styled("No missing values.", theme.positive())));
        }
        Some(report) => {
            lines.push(Line::from(Span::styled(
                format!("Filled {} of {} missing cells:", report.total_filled(), report.total_missing()),
                theme.positive(),
            )));
            for col in &report.columns {
                let fill = col
                    .fill_value
                    .map_or_else(|| "left empty".to_string(), |v| format!("mean {v:.4}"));
                lines.push(hint(&format!("  {:<12} {:>5} → {fill}", col.name, col.missing), theme));
            }
        }
        None => {
            lines.push(header("Missing values", theme));
            let missing = raw.missing_counts();
            if missing.iter().all(|(_, n)| *n == 0) {
                lines.push(hint("None. Preprocessing will pass the table through.", theme));
            }
            for (name, n) in missing.into_iter().filter(|(_, n)| *n > 0) {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {name:<12} "), theme.text()),
                    Span::styled(n.to_string(), theme.warning()),
                ]));
            }
            lines.push(Line::from(""));
            lines.push(hint("[Enter] fill numeric gaps with column means", theme));
        }
    }

    if let Some(processed) = pipeline.processed() {
        lines.push(Line::from(""));
        lines.push(header("Summary", theme));
        lines.push(Line::from(Span::styled(
            format!("{:>12} {:>6} {:>12} {:>12} {:>12} {:>12}", "", "count", "mean", "std", "min", "max"),
            theme.accent(),
        )));
        let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        for s in processed.describe() {
            lines.push(Line::from(Span::styled(
                format!(
                    "{:>12.12} {:>6} {:>12} {:>12} {:>12} {:>12}",
                    s.name,
                    s.count,
                    opt(s.mean),
                    opt(s.std),
                    opt(s.min),
                    opt(s.max)
                ),
                theme.text(),
            )));
        }
    }
    f.render_widget(Paragraph::new(lines), area);
}

// ── Step 3 ───────────────────────────────────────────────────────────

fn render_features(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let form = &app.forms.features;
    let cursor = app.forms.cursor;
    let (top, bottom) = split_vertical(area, (FeatureForm::HEADER_ROWS + form.columns.len() + 3) as u16);

    let mut lines = vec![
        field("Moving average", check(form.add_ma).into(), cursor == 0, theme),
        field("MA window", format!("{} days", form.ma_window), cursor == 1, theme),
        field("Standardize", check(form.scale).into(), cursor == 2, theme),
        field("Target", form.target.clone(), cursor == 3, theme),
    ];
    for (i, col) in form.columns.iter().enumerate() {
        let row = FeatureForm::HEADER_ROWS + i;
        let is_target = *col == form.target;
        let mark = if is_target { "[T]" } else { check(form.selected.contains(col)) };
        lines.push(field("feature", format!("{mark} {col}"), cursor == row, theme));
    }
    lines.push(hint("[Space]toggle [h/l]adjust [a]ll [Enter]apply", theme));
    f.render_widget(Paragraph::new(lines), top);

    let pipeline = &app.session.pipeline;
    let mut lines = notices(app, Step::FeatureEngineer, theme);
    if let (Some(corr), Some(target)) = (pipeline.correlation(), pipeline.target()) {
        lines.push(header(&format!("Correlation with {target}"), theme));
        for (name, r) in corr.ranked_against(target) {
            lines.push(Line::from(vec![
                Span::styled(format!("  {name:<14} "), theme.text()),
                Span::styled(format!("{r:>7.3}"), theme.change_style(r)),
            ]));
        }
    }
    f.render_widget(Paragraph::new(lines), bottom);
}

// ── Step 4 ───────────────────────────────────────────────────────────

fn render_split(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let form = &app.forms.split;
    let cursor = app.forms.cursor;
    let mut lines = vec![
        field("Test size", format!("{}%", form.test_percent), cursor == 0, theme),
        field("Seed", form.seed.to_string(), cursor == 1, theme),
        hint("[h/l]adjust [Enter]split", theme),
        Line::from(""),
    ];
    if let Some(split) = app.session.pipeline.split() {
        lines.push(header("Current split", theme));
        lines.push(field("Train rows", split.n_train().to_string(), false, theme));
        lines.push(field("Test rows", split.n_test().to_string(), false, theme));
        lines.push(field("Features", split.feature_names.join(", "), false, theme));
        lines.push(field("Target", split.target.clone(), false, theme));
        lines.push(field("Seed", split.seed.to_string(), false, theme));
    }
    lines.extend(notices(app, Step::Split, theme));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Step 5 ───────────────────────────────────────────────────────────

fn render_train(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let form = &app.forms.train;
    let cursor = app.forms.cursor;
    let mut lines = vec![field("Model", form.kind.label().into(), cursor == 0, theme)];
    if form.kind.uses_k() {
        lines.push(field("Neighbours k", form.k.to_string(), cursor == 1, theme));
    }
    lines.push(hint("[h/l]adjust [Enter]train (adds to the trained set)", theme));
    lines.push(Line::from(""));
    lines.extend(notices(app, Step::Train, theme));

    for (variant, model) in app.session.pipeline.models() {
        lines.push(Line::from(""));
        let k = model.k.map(|k| format!(", k={k}")).unwrap_or_default();
        lines.push(header(&format!("{variant} ({} rows{k})", model.n_train), theme));
        match model.coefficient_table() {
            Some(table) => {
                lines.push(Line::from(Span::styled(
                    format!(
                        "{:>14} {}",
                        "",
                        table
                            .value_columns
                            .iter()
                            .map(|c| format!("{c:>12.12}"))
                            .collect::<Vec<_>>()
                            .join(" ")
                    ),
                    theme.accent(),
                )));
                for (name, values) in &table.rows {
                    let cells: Vec<String> = values.iter().map(|v| format!("{v:>12.4}")).collect();
                    lines.push(Line::from(Span::styled(
                        format!("{name:>14.14} {}", cells.join(" ")),
                        theme.text(),
                    )));
                }
            }
            None => lines.push(hint("  no coefficients (instance-based model)", theme)),
        }
    }
    f.render_widget(Paragraph::new(lines), area);
}

// ── Step 6 ───────────────────────────────────────────────────────────

fn render_evaluate(f: &mut Frame, area: Rect, pipeline: &PipelineState, theme: &Theme) {
    let mut lines = Vec::new();
    if pipeline.metrics().is_empty() && pipeline.eval_failures().is_empty() {
        lines.push(hint(
            &format!("{} model(s) trained. [Enter] score them on the test set.", pipeline.models().len()),
            theme,
        ));
    } else {
        lines.push(Line::from(Span::styled(
            format!("{:<22} {:>12} {:>12} {:>12} {:>9} {:>6}", "Model", "MSE", "RMSE", "MAE", "R²", "n"),
            theme.accent_bold(),
        )));
        for (variant, m) in pipeline.metrics() {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{:<22} {:>12.4} {:>12.4} {:>12.4} ", variant.label(), m.mse, m.rmse, m.mae),
                    theme.text(),
                ),
                Span::styled(format!("{:>9.4}", m.r2), theme.r2_style(m.r2)),
                Span::styled(format!(" {:>6}", m.n_samples), theme.muted()),
            ]));
        }
        for (variant, reason) in pipeline.eval_failures() {
            lines.push(Line::from(Span::styled(format!("{variant}: {reason}"), theme.negative())));
        }
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Step 7 ───────────────────────────────────────────────────────────

fn render_visualize(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let pipeline = &app.session.pipeline;
    let Some(viz) = pipeline.visualization() else {
        let lines = vec![hint("[Enter] build the result views.", theme)];
        f.render_widget(Paragraph::new(lines), area);
        return;
    };
    let view = app.forms.predict.view;
    let (top, body) = split_vertical(area, 2);
    let tabs: Vec<Span> = VizView::ALL
        .iter()
        .flat_map(|v| {
            let style = if *v == view { theme.selected() } else { theme.muted() };
            [Span::styled(format!(" {} ", v.label()), style), Span::raw(" ")]
        })
        .collect();
    f.render_widget(
        Paragraph::new(vec![Line::from(tabs), hint("[v]iew", theme)]),
        top,
    );

    match view {
        VizView::Importance => {
            let mut lines = vec![header(&format!("Feature importance: {}", viz.primary), theme)];
            match &viz.feature_importance {
                Some(imp) => lines.extend(chart::importance_lines(imp, body.width, theme)),
                None => lines.extend(viz.notes.iter().map(|n| hint(n, theme))),
            }
            f.render_widget(Paragraph::new(lines), body);
        }
        VizView::Series => match &viz.time_series {
            Some(series) => chart::render_series(f, body, series, theme),
            None => {
                let lines: Vec<Line> = viz.notes.iter().map(|n| hint(n, theme)).collect();
                f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), body);
            }
        },
        VizView::Comparison => {
            let best = viz
                .comparison
                .iter()
                .map(|(_, m)| m.r2)
                .fold(f64::NEG_INFINITY, f64::max);
            let mut lines = vec![Line::from(Span::styled(
                format!("{:<22} {:>9} {:>12}", "Model", "R²", "RMSE"),
                theme.accent_bold(),
            ))];
            for (variant, m) in &viz.comparison {
                let marker = if m.r2 == best { " ★" } else { "" };
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<22} ", variant.label()), theme.text()),
                    Span::styled(format!("{:>9.4}", m.r2), theme.r2_style(m.r2)),
                    Span::styled(format!(" {:>12.4}{marker}", m.rmse), theme.text()),
                ]));
            }
            f.render_widget(Paragraph::new(lines), body);
        }
        VizView::Forecast => {
            let lines = match &viz.forecast {
                Some(fc) => vec![
                    header(&format!("{} next trading day ({})", fc.symbol, fc.model), theme),
                    Line::from(""),
                    field("Current", format!("{:.2}", fc.current_price), false, theme),
                    field("Predicted", format!("{:.2}", fc.predicted), false, theme),
                    Line::from(vec![
                        Span::styled(format!("{:>14}: ", "Change"), theme.muted()),
                        Span::styled(
                            format!("{:+.2} ({:+.2}%)", fc.change, fc.change_percent),
                            theme.change_style(fc.change),
                        ),
                    ]),
                    Line::from(""),
                    Line::from(Span::styled("Not financial advice.", theme.warning())),
                ],
                None => viz.notes.iter().map(|n| hint(n, theme)).collect(),
            };
            f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), body);
        }
        VizView::Predict => render_predict(f, body, app, theme),
    }
}

fn render_predict(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let form = &app.forms.predict;
    let ranges = form.ranges(&app.session.pipeline);
    let scale = match form.scale {
        ValueScale::Raw => "raw",
        ValueScale::Scaled => "standardized",
    };
    let model = form.variant.map(|v| v.label()).unwrap_or("none");

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Model ", theme.muted()),
            Span::styled(model, theme.accent()),
            Span::styled("  Inputs ", theme.muted()),
            Span::styled(scale, theme.accent()),
        ]),
        hint("[j/k]field [h/l]adjust [m]odel [s]cale [Enter]predict", theme),
        Line::from(""),
    ];
    for (i, ((name, min, _, max), value)) in ranges.iter().zip(&form.values).enumerate() {
        let style = if i == app.forms.cursor { theme.selected() } else { theme.text() };
        lines.push(Line::from(vec![
            Span::styled(format!("{name:>14.14} "), theme.muted()),
            Span::styled(format!("{value:>12.4}"), style),
            Span::styled(format!("  [{min:.4} … {max:.4}]"), theme.muted()),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(value) = form.last {
        lines.push(Line::from(vec![
            Span::styled("Prediction ", theme.muted()),
            Span::styled(format!("{value:.4}"), Style::default().fg(theme.positive)),
        ]));
    }
    f.render_widget(Paragraph::new(lines), area);
}
