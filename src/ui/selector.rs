// Terminal list selector.
// Renders candidates as a ratatui list on stderr and returns the user's pick.
// Libraries can be re-sorted and filtered in place.

use std::cmp::Ordering;
use std::io::{self, Stderr};

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{prelude::*, widgets::*};

use crate::context7::Library;
use crate::error::{Ctx7Error, Result};

use super::Presenter;

/// Interactive selector drawn on stderr so stdout stays clean for the document.
#[derive(Debug, Default)]
pub struct TerminalSelector;

impl TerminalSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Presenter for TerminalSelector {
    fn choose_library(&mut self, candidates: &[Library]) -> Result<String> {
        if candidates.is_empty() {
            return Err(Ctx7Error::Other("no libraries to select".to_string()));
        }
        let mut picker = LibraryPicker::new(candidates);
        let index = run_picker(&mut picker)?;
        Ok(candidates[index].id.clone())
    }

    fn choose_version(&mut self, versions: &[String]) -> Result<String> {
        if versions.is_empty() {
            return Err(Ctx7Error::Other("no versions to select".to_string()));
        }
        let mut picker = VersionPicker::new(versions);
        let index = run_picker(&mut picker)?;
        Ok(versions[index].clone())
    }
}

/// Restores the terminal when dropped, including on error paths.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(err) = execute!(io::stderr(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
    }
}

/// Cursor over a list of `len` rows, independent of the terminal.
#[derive(Debug)]
struct Selection {
    len: usize,
    state: ListState,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Select(usize),
    Cancel,
}

impl Selection {
    fn new(len: usize) -> Self {
        let mut selection = Self {
            len,
            state: ListState::default(),
        };
        selection.reset(len);
        selection
    }

    /// Point at the first row of a list that now has `len` rows.
    fn reset(&mut self, len: usize) {
        self.len = len;
        self.state.select(if len == 0 { None } else { Some(0) });
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        let current = self.state.selected().unwrap_or(0);
        let last = self.len.saturating_sub(1);
        let next = match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Action::Cancel,
            KeyCode::Esc | KeyCode::Char('q') => return Action::Cancel,
            KeyCode::Enter if self.len > 0 => return Action::Select(current),
            KeyCode::Up | KeyCode::Char('k') => current.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => (current + 1).min(last),
            KeyCode::Home | KeyCode::Char('g') => 0,
            KeyCode::End | KeyCode::Char('G') => last,
            _ => return Action::Continue,
        };
        if self.len > 0 {
            self.state.select(Some(next));
        }
        Action::Continue
    }
}

/// A list the terminal loop can draw and drive. `Select` carries an index
/// into the caller's original slice.
trait Picker {
    fn title(&self) -> String;
    fn items(&self) -> Vec<ListItem<'static>>;
    /// Optional line between the list and the key hints.
    fn status(&self) -> Option<Line<'static>>;
    fn hints(&self) -> &'static [(&'static str, &'static str)];
    fn state_mut(&mut self) -> &mut ListState;
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action;
}

static NAVIGATION_HINTS: [(&str, &str); 3] = [
    ("Enter", "Select"),
    ("↑↓", "Navigate"),
    ("Esc", "Cancel"),
];

static LIBRARY_HINTS: [(&str, &str); 5] = [
    ("Enter", "Select"),
    ("↑↓", "Navigate"),
    ("s", "Sort"),
    ("/", "Filter"),
    ("Esc", "Cancel"),
];

/// Library ordering, cycled with `s`. Every mode sorts descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum SortMode {
    #[default]
    Stars,
    Trust,
    Updated,
    Tokens,
    Relevance,
}

impl SortMode {
    fn next(self) -> Self {
        match self {
            SortMode::Stars => SortMode::Trust,
            SortMode::Trust => SortMode::Updated,
            SortMode::Updated => SortMode::Tokens,
            SortMode::Tokens => SortMode::Relevance,
            SortMode::Relevance => SortMode::Stars,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortMode::Stars => "Stars",
            SortMode::Trust => "Trust",
            SortMode::Updated => "Updated",
            SortMode::Tokens => "Tokens",
            SortMode::Relevance => "Relevance",
        }
    }

    fn compare(self, a: &Library, b: &Library) -> Ordering {
        match self {
            SortMode::Stars => b.stars.cmp(&a.stars),
            SortMode::Trust => b.trust_score.total_cmp(&a.trust_score),
            // Unparseable dates sort last.
            SortMode::Updated => updated_at(b).cmp(&updated_at(a)),
            SortMode::Tokens => b.total_tokens.cmp(&a.total_tokens),
            SortMode::Relevance => b.score.total_cmp(&a.score),
        }
    }
}

fn updated_at(lib: &Library) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&lib.last_update_date)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Case-insensitive substring match on title, description, and ID.
fn matches_filter(lib: &Library, needle: &str) -> bool {
    format!("{} {} {}", lib.title, lib.description, lib.id)
        .to_lowercase()
        .contains(needle)
}

/// Sortable, filterable view over search candidates.
struct LibraryPicker<'a> {
    libraries: &'a [Library],
    sort: SortMode,
    /// `Some` while the filter prompt is open.
    filter: Option<String>,
    /// Indices into `libraries` in display order.
    visible: Vec<usize>,
    selection: Selection,
}

impl<'a> LibraryPicker<'a> {
    fn new(libraries: &'a [Library]) -> Self {
        let mut picker = Self {
            libraries,
            sort: SortMode::default(),
            filter: None,
            visible: Vec::new(),
            selection: Selection::new(0),
        };
        picker.refresh();
        picker
    }

    /// Re-apply filter and sort. Ties keep the search order.
    fn refresh(&mut self) {
        let needle = self.filter.as_deref().unwrap_or_default().to_lowercase();
        let libraries = self.libraries;
        let sort = self.sort;

        self.visible = (0..libraries.len())
            .filter(|&i| needle.is_empty() || matches_filter(&libraries[i], &needle))
            .collect();
        self.visible
            .sort_by(|&a, &b| sort.compare(&libraries[a], &libraries[b]));
        self.selection.reset(self.visible.len());
    }

    /// Keys consumed by the filter prompt or the sort toggle.
    fn handle_list_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        let typing = !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        if self.filter.is_none() {
            match code {
                KeyCode::Char('/') => self.filter = Some(String::new()),
                KeyCode::Char('s') => self.sort = self.sort.next(),
                _ => return false,
            }
            self.refresh();
            return true;
        }

        match code {
            KeyCode::Esc | KeyCode::Char('/') => self.filter = None,
            KeyCode::Backspace => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.pop();
                }
            }
            KeyCode::Char(c) if typing => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.push(c);
                }
            }
            _ => return false,
        }
        self.refresh();
        true
    }
}

impl Picker for LibraryPicker<'_> {
    fn title(&self) -> String {
        format!(" 🔍 Library Search ({} results) ", self.visible.len())
    }

    fn items(&self) -> Vec<ListItem<'static>> {
        self.visible
            .iter()
            .map(|&i| library_item(&self.libraries[i]))
            .collect()
    }

    fn status(&self) -> Option<Line<'static>> {
        let mut spans = Vec::new();
        if let Some(filter) = &self.filter {
            spans.push(Span::styled(
                format!("Filter: {}_  ", filter),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ));
        }
        spans.push(Span::styled(
            format!("Sort: {} ▼", self.sort.label()),
            Style::default().fg(Color::DarkGray),
        ));
        Some(Line::from(spans))
    }

    fn hints(&self) -> &'static [(&'static str, &'static str)] {
        &LIBRARY_HINTS
    }

    fn state_mut(&mut self) -> &mut ListState {
        &mut self.selection.state
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        if self.handle_list_key(code, modifiers) {
            return Action::Continue;
        }
        match self.selection.handle_key(code, modifiers) {
            Action::Select(row) => self
                .visible
                .get(row)
                .map_or(Action::Continue, |&index| Action::Select(index)),
            action => action,
        }
    }
}

struct VersionPicker {
    labels: Vec<String>,
    selection: Selection,
}

impl VersionPicker {
    fn new(versions: &[String]) -> Self {
        Self {
            labels: version_labels(versions),
            selection: Selection::new(versions.len()),
        }
    }
}

impl Picker for VersionPicker {
    fn title(&self) -> String {
        " Select a version ".to_string()
    }

    fn items(&self) -> Vec<ListItem<'static>> {
        self.labels.iter().cloned().map(ListItem::new).collect()
    }

    fn status(&self) -> Option<Line<'static>> {
        None
    }

    fn hints(&self) -> &'static [(&'static str, &'static str)] {
        &NAVIGATION_HINTS
    }

    fn state_mut(&mut self) -> &mut ListState {
        &mut self.selection.state
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        self.selection.handle_key(code, modifiers)
    }
}

fn run_picker(picker: &mut impl Picker) -> Result<usize> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal: Terminal<CrosstermBackend<Stderr>> =
        Terminal::new(CrosstermBackend::new(io::stderr()))?;

    loop {
        let title = picker.title();
        let items = picker.items();
        let status = picker.status();
        let hints = picker.hints();
        terminal.draw(|frame| draw(frame, &title, items, status, hints, picker.state_mut()))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match picker.handle_key(key.code, key.modifiers) {
                Action::Continue => {}
                Action::Select(index) => return Ok(index),
                Action::Cancel => return Err(Ctx7Error::Cancelled),
            }
        }
    }
}

fn draw(
    frame: &mut Frame,
    title: &str,
    items: Vec<ListItem<'static>>,
    status: Option<Line<'static>>,
    hints: &[(&str, &str)],
    state: &mut ListState,
) {
    let status_height = if status.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(status_height),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title(title.to_string()),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], state);

    if let Some(status) = status {
        frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), chunks[1]);
    }

    let instructions: Vec<Span> = hints
        .iter()
        .flat_map(|(key, action)| {
            [
                Span::styled(format!(" {}", key), Style::default().fg(Color::Yellow)),
                Span::styled(format!(" = {} ", action), Style::default().fg(Color::DarkGray)),
            ]
        })
        .collect();
    frame.render_widget(
        Paragraph::new(Line::from(instructions)).alignment(Alignment::Center),
        chunks[2],
    );
}

/// Three-line list row: title and scores, origin and size, description.
fn library_item(lib: &Library) -> ListItem<'static> {
    let vip = if lib.vip { " ✨" } else { "" };
    let updated = DateTime::parse_from_rfc3339(&lib.last_update_date)
        .map(|dt| format_relative_time(&dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| lib.last_update_date.clone());

    let mut meta = format!(
        "@{} • {} • 🔢 {} tokens",
        lib.organization(),
        updated,
        compact_number(lib.total_tokens)
    );
    if !lib.versions.is_empty() {
        meta.push_str(&format!(" • [{} versions]", lib.versions.len()));
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled(lib.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                "  ⭐ {}  🏆 {:.1}{}",
                compact_number(lib.stars),
                lib.trust_score,
                vip
            )),
        ]),
        Line::styled(meta, Style::default().fg(Color::DarkGray)),
    ];
    if !lib.description.is_empty() {
        lines.push(Line::styled(
            truncate(&lib.description, 80),
            Style::default().fg(Color::Gray),
        ));
    }
    ListItem::new(lines)
}

/// Display labels for a version list; the first entry is the newest.
pub fn version_labels(versions: &[String]) -> Vec<String> {
    match versions {
        [only] if only == crate::cache::DEFAULT_VERSION => {
            vec!["documentation available (not versioned)".to_string()]
        }
        [only] => vec![format!("{} (only version)", only)],
        _ => versions
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i == 0 {
                    format!("{} (latest)", v)
                } else {
                    v.clone()
                }
            })
            .collect(),
    }
}

/// Format a timestamp as relative time (e.g., "2h ago").
pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*dt);

    if duration.num_days() > 0 {
        format!("{}d ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// Abbreviate large counts: 950, 1.2k, 3.4M.
fn compact_number(n: u64) -> String {
    match n {
        0..1_000 => n.to_string(),
        1_000..1_000_000 => format!("{:.1}k", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_version_labels() {
        assert_eq!(
            version_labels(&strings(&["default"])),
            ["documentation available (not versioned)"]
        );
        assert_eq!(version_labels(&strings(&["v2"])), ["v2 (only version)"]);
        assert_eq!(
            version_labels(&strings(&["v3", "v2", "v1"])),
            ["v3 (latest)", "v2", "v1"]
        );
    }

    #[test]
    fn test_selection_navigation() {
        let mut selection = Selection::new(3);
        let none = KeyModifiers::NONE;

        selection.handle_key(KeyCode::Up, none);
        assert_eq!(selection.state.selected(), Some(0));

        selection.handle_key(KeyCode::Down, none);
        selection.handle_key(KeyCode::Char('j'), none);
        selection.handle_key(KeyCode::Down, none);
        assert_eq!(selection.state.selected(), Some(2));

        assert!(matches!(selection.handle_key(KeyCode::Enter, none), Action::Select(2)));
        assert!(matches!(selection.handle_key(KeyCode::Esc, none), Action::Cancel));
        assert!(matches!(
            selection.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Action::Cancel
        ));
    }

    #[test]
    fn test_empty_selection_ignores_navigation() {
        let mut selection = Selection::new(0);
        let none = KeyModifiers::NONE;

        assert_eq!(selection.handle_key(KeyCode::Down, none), Action::Continue);
        assert_eq!(selection.handle_key(KeyCode::End, none), Action::Continue);
        assert_eq!(selection.handle_key(KeyCode::Enter, none), Action::Continue);
        assert_eq!(selection.state.selected(), None);
    }

    fn library(id: &str, title: &str, stars: u64, trust: f64, updated: &str, tokens: u64, score: f64) -> Library {
        Library {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} docs", title),
            last_update_date: updated.to_string(),
            stars,
            trust_score: trust,
            total_tokens: tokens,
            score,
            ..Library::default()
        }
    }

    fn candidates() -> Vec<Library> {
        vec![
            library("/remix-run/react-router", "React Router", 10, 9.0, "2025-01-01T00:00:00Z", 500, 0.1),
            library("/acme/router", "Acme Router", 50, 5.0, "not a date", 9000, 0.9),
            library("/vercel/next.js", "Next.js", 30, 7.0, "2025-06-01T00:00:00Z", 20, 0.5),
        ]
    }

    fn press(picker: &mut LibraryPicker, keys: &str) {
        for c in keys.chars() {
            picker.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    #[test]
    fn test_library_picker_sort_cycle() {
        let libraries = candidates();
        let mut picker = LibraryPicker::new(&libraries);
        assert_eq!(picker.sort, SortMode::Stars);
        assert_eq!(picker.visible, [1, 2, 0]);

        let expected = [
            (SortMode::Trust, [0, 2, 1]),
            (SortMode::Updated, [2, 0, 1]),
            (SortMode::Tokens, [1, 0, 2]),
            (SortMode::Relevance, [1, 2, 0]),
            (SortMode::Stars, [1, 2, 0]),
        ];
        for (mode, order) in expected {
            press(&mut picker, "s");
            assert_eq!(picker.sort, mode);
            assert_eq!(picker.visible, order, "order for {}", mode.label());
        }
    }

    #[test]
    fn test_library_picker_selects_original_index() {
        let libraries = candidates();
        let mut picker = LibraryPicker::new(&libraries);

        picker.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(picker.handle_key(KeyCode::Enter, KeyModifiers::NONE), Action::Select(2));
    }

    #[test]
    fn test_library_picker_filter() {
        let libraries = candidates();
        let mut picker = LibraryPicker::new(&libraries);

        press(&mut picker, "/ROUTER");
        assert_eq!(picker.filter.as_deref(), Some("ROUTER"));
        assert_eq!(picker.visible, [1, 0]);
        assert_eq!(picker.title(), " 🔍 Library Search (2 results) ");

        // Letters go to the prompt instead of sorting or quitting.
        press(&mut picker, "sq");
        assert_eq!(picker.sort, SortMode::Stars);
        assert!(picker.visible.is_empty());
        picker.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        picker.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(picker.visible, [1, 0]);

        picker.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(picker.handle_key(KeyCode::Enter, KeyModifiers::NONE), Action::Select(0));

        assert_eq!(picker.handle_key(KeyCode::Esc, KeyModifiers::NONE), Action::Continue);
        assert!(picker.filter.is_none());
        assert_eq!(picker.visible, [1, 2, 0]);
        assert_eq!(picker.handle_key(KeyCode::Esc, KeyModifiers::NONE), Action::Cancel);
    }

    #[test]
    fn test_library_picker_filter_matches_id_and_description() {
        let libraries = candidates();
        let mut picker = LibraryPicker::new(&libraries);

        press(&mut picker, "/vercel");
        assert_eq!(picker.visible, [2]);

        press(&mut picker, "/");
        press(&mut picker, "/next.js docs");
        assert_eq!(picker.visible, [2]);
    }

    #[test]
    fn test_library_picker_enter_on_empty_filter_result() {
        let libraries = candidates();
        let mut picker = LibraryPicker::new(&libraries);

        press(&mut picker, "/zzz");
        assert!(picker.visible.is_empty());
        assert_eq!(picker.handle_key(KeyCode::Down, KeyModifiers::NONE), Action::Continue);
        assert_eq!(picker.handle_key(KeyCode::Enter, KeyModifiers::NONE), Action::Continue);
        assert!(matches!(
            picker.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Action::Cancel
        ));
    }

    #[test]
    fn test_compact_number() {
        assert_eq!(compact_number(950), "950");
        assert_eq!(compact_number(1_240), "1.2k");
        assert_eq!(compact_number(3_400_000), "3.4M");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description here", 8), "a long…");
    }

    #[test]
    fn test_format_relative_time() {
        let now = Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - chrono::Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - chrono::Duration::days(2))), "2d ago");
    }
}
