// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use procon_app::{
    ArrayCommand, ArrayEvent, ArraySelector, CellCommand, CellState, ConsoleCommand, ConsoleMode,
    ConsoleState, EditableTable, EntityId, FieldDescriptor, FormEngine, FormOutcome, FormQuery,
    ListParams, ModalMode, NamesRequest, NamesResponse, PageRequest, PaginatedFetch,
    ProgressStatus, Record, RemoteBinding, RemoteSelector, RenderConfig, Rendered,
    RendererRegistry, SchemaError, SchemaIndex, SelectField, SelectorCommand, SelectorEvent,
    SortKey, SortOrder, Surface, TableEvent, TableResult, Trend, backend_filter, input_text,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use serde_json::{Value, json};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const SORT_MARK_ASC: &str = "▲";
const SORT_MARK_DESC: &str = "▼";
const CURSOR_MARK: &str = ">";
const EDIT_CARET: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOptions {
    pub page_id: String,
    pub api: String,
    pub page_size: usize,
    pub collapsed_fields: usize,
    pub render: RenderConfig,
}

/// The row and field a picker edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerTarget {
    pub row: EntityId,
    pub field: String,
}

#[derive(Debug)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Names {
        target: PickerTarget,
        response: NamesResponse,
    },
}

/// Data access the console needs on top of paged listing.
pub trait ConsoleRuntime: PaginatedFetch {
    fn save_record(&mut self, api: &str, record: &Record) -> Result<()>;

    /// Resolves display names for a picker. The default runs the fetch
    /// inline and reports through `tx` like a background worker would.
    fn spawn_names(
        &mut self,
        target: PickerTarget,
        request: NamesRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let response = request.run(self);
        tx.send(InternalEvent::Names { target, response })
            .map_err(|_| anyhow!("names listener is gone"))
    }
}

/// Single-select bindings edit one id through a plain selector; multi-select
/// bindings keep an ordered entry list.
#[derive(Debug, Clone)]
enum PickerModel {
    Single(RemoteSelector),
    Multiple(ArraySelector),
}

impl PickerModel {
    fn new(binding: &RemoteBinding, page_size: usize) -> Result<Self, SchemaError> {
        if binding.multiple {
            Ok(Self::Multiple(
                ArraySelector::new(binding)?.with_page_size(page_size),
            ))
        } else {
            Ok(Self::Single(
                RemoteSelector::new(binding)?.with_page_size(page_size),
            ))
        }
    }

    fn selector(&self) -> &RemoteSelector {
        match self {
            Self::Single(selector) => selector,
            Self::Multiple(array) => array.selector(),
        }
    }

    /// `(id, position)` of every listed selection, in order.
    fn listed(&self) -> Vec<(EntityId, u32)> {
        match self {
            Self::Single(selector) => selector
                .output()
                .iter()
                .zip(1..)
                .map(|(id, position)| (*id, position))
                .collect(),
            Self::Multiple(array) => array
                .entries()
                .iter()
                .map(|entry| (entry.id, entry.sequence))
                .collect(),
        }
    }

    fn dispatch(&mut self, command: SelectorCommand) -> Vec<SelectorEvent> {
        match self {
            Self::Single(selector) => selector.dispatch(command),
            Self::Multiple(array) => selector_events(array.dispatch(ArrayCommand::Selector(command))),
        }
    }

    fn set_value(&mut self, value: &Value) -> Vec<SelectorEvent> {
        match self {
            Self::Single(selector) => selector.set_value(value),
            Self::Multiple(array) => selector_events(array.set_value(value)),
        }
    }

    fn apply_fetch(&mut self, response: NamesResponse) -> Vec<SelectorEvent> {
        match self {
            Self::Single(selector) => selector.apply_names(response),
            Self::Multiple(array) => selector_events(array.apply_fetch(response)),
        }
    }

    fn fetch_data<S: PaginatedFetch + ?Sized>(
        &mut self,
        source: &mut S,
        page: PageRequest,
        sorter: &[SortKey],
        filters: &Record,
    ) -> Result<TableResult> {
        match self {
            Self::Single(selector) => selector.fetch_data(source, page, sorter, filters),
            Self::Multiple(array) => array.fetch_data(source, page, sorter, filters),
        }
    }

    /// Reordering only applies to multi-select lists.
    fn move_entry(&mut self, old_index: usize, new_index: usize) -> Vec<SelectorEvent> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Multiple(array) => selector_events(array.dispatch(ArrayCommand::Move {
                old_index,
                new_index,
            })),
        }
    }

    fn remove(&mut self, id: EntityId) -> Vec<SelectorEvent> {
        match self {
            Self::Single(selector) => selector.set_value(&Value::Null),
            Self::Multiple(array) => selector_events(array.dispatch(ArrayCommand::Remove(id))),
        }
    }
}

fn selector_events(events: Vec<ArrayEvent>) -> Vec<SelectorEvent> {
    events
        .into_iter()
        .filter_map(|event| match event {
            ArrayEvent::Selector(event) => Some(event),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone)]
struct PickerUi {
    target: PickerTarget,
    model: PickerModel,
    entry_cursor: usize,
    row_cursor: usize,
    /// Applied modal filter text and its parsed form.
    filter_text: String,
    filter: Record,
    /// Modal filter being typed; `None` when not editing.
    filter_input: Option<String>,
    /// Index into the select fields and direction of the modal sort.
    sort: Option<(usize, SortOrder)>,
}

impl PickerUi {
    fn sort_keys(&self) -> Vec<SortKey> {
        self.sort
            .and_then(|(index, order)| {
                let field = self.model.selector().select_fields().get(index)?;
                Some(SortKey::new(&field.field, order))
            })
            .into_iter()
            .collect()
    }

    /// None -> first field ascending -> descending -> next field ... -> None.
    fn cycle_sort(&mut self) {
        let fields = self.model.selector().select_fields().len();
        self.sort = match self.sort {
            None if fields > 0 => Some((0, SortOrder::Ascend)),
            None => None,
            Some((index, SortOrder::Ascend)) => Some((index, SortOrder::Descend)),
            Some((index, SortOrder::Descend)) if index + 1 < fields => {
                Some((index + 1, SortOrder::Ascend))
            }
            Some((_, SortOrder::Descend)) => None,
        };
    }
}

/// Parses `field=value` terms separated by `;`. A bare term searches the
/// first select field. Only `id` and the select fields can be filtered.
fn parse_modal_filter(text: &str, fields: &[SelectField]) -> Result<Record, String> {
    let mut filter = Record::new();
    for term in text.split(';').map(str::trim).filter(|term| !term.is_empty()) {
        let (key, value) = match term.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => match fields.first() {
                Some(field) => (field.field.as_str(), term),
                None => return Err(format!("no field to search for {term:?}")),
            },
        };
        if key != "id" && !fields.iter().any(|field| field.field == key) {
            return Err(format!("unknown filter field {key}"));
        }
        filter.insert(key.to_owned(), Value::String(value.to_owned()));
    }
    Ok(filter)
}

#[derive(Debug)]
pub struct ViewData {
    options: ConsoleOptions,
    index: Arc<SchemaIndex>,
    renderer: RendererRegistry,
    table: EditableTable,
    columns: Vec<String>,
    search: FormEngine,
    search_cursor: usize,
    search_buffer: String,
    query: FormQuery,
    page: PageRequest,
    total: u64,
    selected_row: usize,
    selected_col: usize,
    picker: Option<PickerUi>,
    status_token: u64,
}

impl ViewData {
    pub fn new(index: SchemaIndex, options: ConsoleOptions) -> Self {
        let index = Arc::new(index);
        let columns = index
            .visible(Surface::Table)
            .map(FieldDescriptor::key)
            .collect();
        let search = FormEngine::new(Arc::clone(&index), Surface::Search)
            .with_collapsed_count(options.collapsed_fields);
        Self {
            renderer: RendererRegistry::with_defaults(options.render.clone()),
            table: EditableTable::new(Arc::clone(&index), Vec::new()),
            page: PageRequest::new(1, options.page_size),
            options,
            index,
            columns,
            search,
            search_cursor: 0,
            search_buffer: String::new(),
            query: FormQuery::default(),
            total: 0,
            selected_row: 0,
            selected_col: 0,
            picker: None,
            status_token: 0,
        }
    }

    pub fn rows(&self) -> &[Record] {
        self.table.rows()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    pub fn query(&self) -> &FormQuery {
        &self.query
    }

    fn page_count(&self) -> usize {
        let total = usize::try_from(self.total).unwrap_or(usize::MAX);
        total.div_ceil(self.page.page_size).max(1)
    }

    fn selected_id(&self) -> Option<EntityId> {
        self.table
            .rows()
            .get(self.selected_row)
            .and_then(|row| row.get("id"))
            .and_then(EntityId::from_value)
    }

    fn selected_field(&self) -> Option<&FieldDescriptor> {
        self.columns
            .get(self.selected_col)
            .and_then(|key| self.index.get(key))
    }

    fn select_column(&mut self, key: &str) -> bool {
        match self.columns.iter().position(|column| column == key) {
            Some(position) => {
                self.selected_col = position;
                true
            }
            None => false,
        }
    }

    fn search_keys(&self) -> Vec<String> {
        self.search
            .items(&self.renderer)
            .iter()
            .map(|item| item.field.key())
            .collect()
    }
}

pub fn run_console<R: ConsoleRuntime>(
    state: &mut ConsoleState,
    runtime: &mut R,
    mut view_data: ViewData,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_rows(runtime, &mut view_data) {
        state.dispatch(ConsoleCommand::Notify(format!("load failed: {error:#}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

/// Loads the current page with the current query.
pub fn refresh_rows<R: ConsoleRuntime + ?Sized>(
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let filter = search_filter(&view_data.index, &view_data.query.filter);
    let params = ListParams::new(&filter, &view_data.query.sort, view_data.page);
    let page = runtime
        .fetch_page(&view_data.options.page_id, &view_data.options.api, &params)
        .with_context(|| {
            format!(
                "load {}/{}",
                view_data.options.page_id, view_data.options.api
            )
        })?;
    view_data.total = page.count;
    view_data.table.set_rows(page.data);
    view_data.selected_row = view_data
        .selected_row
        .min(view_data.table.rows().len().saturating_sub(1));
    Ok(())
}

/// Search values in the backend filter language. A two-ended range on a
/// range-typed field becomes a `gte`/`lte` pair.
fn search_filter(index: &SchemaIndex, filter: &Record) -> Record {
    let mut ranged = Record::new();
    for (key, value) in filter {
        let is_range = index
            .get(key)
            .and_then(|field| field.value_type.fixed_kind())
            .is_some_and(|kind| kind.is_range());
        match value {
            Value::Array(ends) if is_range && ends.len() == 2 => {
                ranged.insert(key.clone(), json!({"gte": ends[0], "lte": ends[1]}));
            }
            other => {
                ranged.insert(key.clone(), other.clone());
            }
        }
    }
    backend_filter(&ranged)
}

fn process_internal_events(
    state: &mut ConsoleState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(ConsoleCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Names { target, response } => {
                let Some(picker) = view_data
                    .picker
                    .as_mut()
                    .filter(|picker| picker.target == target)
                else {
                    debug!(row = %target.row, field = %target.field, "names for a closed picker");
                    continue;
                };
                let events = picker.model.apply_fetch(response);
                picker.entry_cursor = picker
                    .entry_cursor
                    .min(picker.model.listed().len().saturating_sub(1));
                for event in events {
                    if let SelectorEvent::FetchFailed(message) = event {
                        emit_status(state, view_data, tx, format!("names failed: {message}"));
                    }
                }
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut ConsoleState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(ConsoleCommand::Notify(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q') {
        return true;
    }
    match state.mode {
        ConsoleMode::Nav => return handle_nav_key(state, runtime, view_data, internal_tx, key),
        ConsoleMode::Edit => handle_edit_key(state, runtime, view_data, internal_tx, key),
        ConsoleMode::Search => handle_search_key(state, runtime, view_data, internal_tx, key),
        ConsoleMode::Picker => handle_picker_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => move_row(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(view_data, -1),
        KeyCode::Char('l') | KeyCode::Right => move_col(view_data, 1),
        KeyCode::Char('h') | KeyCode::Left => move_col(view_data, -1),
        KeyCode::Char('g') => view_data.selected_row = 0,
        KeyCode::Char('G') => {
            view_data.selected_row = view_data.table.rows().len().saturating_sub(1);
        }
        KeyCode::Char('n') => change_page(state, runtime, view_data, internal_tx, 1),
        KeyCode::Char('N') => change_page(state, runtime, view_data, internal_tx, -1),
        KeyCode::Char('s') => cycle_sort(state, runtime, view_data, internal_tx),
        KeyCode::Char('r') => reload(state, runtime, view_data, internal_tx),
        KeyCode::Char('/') => open_search(state, view_data),
        KeyCode::Char('i') => {
            state.dispatch(ConsoleCommand::EnterEditMode);
        }
        KeyCode::Char('p') => open_picker(state, runtime, view_data, internal_tx),
        KeyCode::Char('!') => {
            state.dispatch(ConsoleCommand::ToggleErrors);
        }
        _ => {}
    }
    false
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let len = view_data.table.rows().len();
    view_data.selected_row = step(view_data.selected_row, delta, len);
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    view_data.selected_col = step(view_data.selected_col, delta, view_data.columns.len());
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

fn reload<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = refresh_rows(runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn change_page<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let target = view_data.page.current.saturating_add_signed(delta);
    if target < 1 || target > view_data.page_count() || target == view_data.page.current {
        emit_status(state, view_data, internal_tx, "no more pages");
        return;
    }
    let previous = view_data.page;
    view_data.page = PageRequest::new(target, previous.page_size);
    view_data.selected_row = 0;
    if let Err(error) = refresh_rows(runtime, view_data) {
        view_data.page = previous;
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

/// Unsorted -> ascending -> descending -> unsorted on the selected column.
fn cycle_sort<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(field) = view_data.selected_field() else {
        return;
    };
    let (key, title) = (field.key(), field.title.clone());
    let current = view_data
        .query
        .sort
        .iter()
        .find(|sort| sort.field == key)
        .map(|sort| sort.order);
    view_data.query.sort.retain(|sort| sort.field != key);
    let next = match current {
        None => Some(SortOrder::Ascend),
        Some(SortOrder::Ascend) => Some(SortOrder::Descend),
        Some(SortOrder::Descend) => None,
    };
    if let Some(order) = next {
        view_data.query.sort.insert(0, SortKey::new(&key, order));
    }
    view_data.page = PageRequest::new(1, view_data.page.page_size);
    reload(state, runtime, view_data, internal_tx);
    let message = match next {
        Some(order) => format!("sorted by {title} {}", order.as_backend()),
        None => format!("unsorted {title}"),
    };
    emit_status(state, view_data, internal_tx, message);
}

fn handle_edit_key<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let (Some(row), Some(field)) = (view_data.selected_id(), view_data.selected_field().cloned())
    else {
        state.dispatch(ConsoleCommand::ExitToNav);
        return;
    };
    let field_key = field.key();

    if view_data.table.is_editing(row, &field_key) {
        let mut pending = pending_text(&view_data.table, row, &field_key);
        let command = match key.code {
            KeyCode::Char(ch) => {
                pending.push(ch);
                CellCommand::Input(pending)
            }
            KeyCode::Backspace => {
                pending.pop();
                CellCommand::Input(pending)
            }
            KeyCode::Enter => CellCommand::Enter,
            KeyCode::Tab => CellCommand::Blur,
            KeyCode::Esc => CellCommand::Escape,
            _ => return,
        };
        let events = view_data.table.dispatch(row, &field_key, command);
        apply_table_events(state, runtime, view_data, internal_tx, events);
        return;
    }

    match key.code {
        KeyCode::Esc => {
            state.dispatch(ConsoleCommand::ExitToNav);
        }
        KeyCode::Enter | KeyCode::Char('e') => {
            let events = view_data.table.dispatch(row, &field_key, CellCommand::Click);
            if events.is_empty() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{} is read-only", field.title),
                );
                return;
            }
            apply_table_events(state, runtime, view_data, internal_tx, events);
        }
        KeyCode::Char('j') | KeyCode::Down => move_row(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(view_data, -1),
        KeyCode::Char('l') | KeyCode::Right => move_col(view_data, 1),
        KeyCode::Char('h') | KeyCode::Left => move_col(view_data, -1),
        _ => {}
    }
}

fn pending_text(table: &EditableTable, row: EntityId, field: &str) -> String {
    match table.cell(row, field).map(|cell| &cell.state) {
        Some(CellState::Editing { pending, .. }) => pending.clone(),
        _ => String::new(),
    }
}

fn apply_table_events<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: Vec<TableEvent>,
) {
    for event in events {
        match event {
            TableEvent::EditStarted { field, .. } => {
                emit_status(state, view_data, internal_tx, format!("editing {field}"));
            }
            TableEvent::Committed { row, field, .. } => {
                persist_row(state, runtime, view_data, internal_tx, row, &field);
            }
            TableEvent::RowsChanged(_) => {}
            TableEvent::ValidationFailed { field, errors, .. } => {
                let message = errors
                    .first()
                    .map(|error| error.message.clone())
                    .unwrap_or_else(|| "invalid value".to_owned());
                emit_status(state, view_data, internal_tx, format!("{field}: {message}"));
            }
            TableEvent::EditCancelled { field, .. } => {
                emit_status(state, view_data, internal_tx, format!("{field} unchanged"));
            }
        }
    }
}

fn persist_row<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    row: EntityId,
    field: &str,
) {
    let Some(record) = view_data.table.row(row).cloned() else {
        return;
    };
    let message = match runtime.save_record(&view_data.options.api, &record) {
        Ok(()) => format!("saved {field} on row {row}"),
        Err(error) => {
            warn!(%row, field, error = %format!("{error:#}"), "save failed");
            format!("save failed: {error:#}")
        }
    };
    emit_status(state, view_data, internal_tx, message);
}

fn open_search(state: &mut ConsoleState, view_data: &mut ViewData) {
    state.dispatch(ConsoleCommand::OpenSearch);
    view_data.search_cursor = 0;
    load_search_buffer(view_data);
}

fn load_search_buffer(view_data: &mut ViewData) {
    let keys = view_data.search_keys();
    view_data.search_cursor = view_data
        .search_cursor
        .min(keys.len().saturating_sub(1));
    view_data.search_buffer = keys
        .get(view_data.search_cursor)
        .map(|key| input_text(view_data.search.value(key).filter(|value| !value.is_null())))
        .unwrap_or_default();
}

fn commit_search_buffer(view_data: &mut ViewData) -> Result<(), String> {
    let keys = view_data.search_keys();
    let Some(key) = keys.get(view_data.search_cursor) else {
        return Ok(());
    };
    view_data
        .search
        .set_input(key, &view_data.search_buffer)
        .map_err(|error| format!("{}: {}", error.field, error.message))
}

fn handle_search_key<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('r') => {
                view_data.search.reset();
                load_search_buffer(view_data);
                emit_status(state, view_data, internal_tx, "search reset");
            }
            KeyCode::Char('e') => {
                if let Err(message) = commit_search_buffer(view_data) {
                    emit_status(state, view_data, internal_tx, message);
                    return;
                }
                let collapsed = view_data.search.toggle_collapse();
                load_search_buffer(view_data);
                let message = if collapsed { "fewer fields" } else { "all fields" };
                emit_status(state, view_data, internal_tx, message);
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            state.dispatch(ConsoleCommand::ExitToNav);
        }
        KeyCode::Up | KeyCode::BackTab => move_search_cursor(state, view_data, internal_tx, -1),
        KeyCode::Down | KeyCode::Tab => move_search_cursor(state, view_data, internal_tx, 1),
        KeyCode::Char(ch) => view_data.search_buffer.push(ch),
        KeyCode::Backspace => {
            view_data.search_buffer.pop();
        }
        KeyCode::Enter => submit_search(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

fn move_search_cursor(
    state: &mut ConsoleState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    if let Err(message) = commit_search_buffer(view_data) {
        emit_status(state, view_data, internal_tx, message);
        return;
    }
    let len = view_data.search_keys().len();
    view_data.search_cursor = step(view_data.search_cursor, delta, len);
    load_search_buffer(view_data);
}

fn submit_search<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(message) = commit_search_buffer(view_data) {
        emit_status(state, view_data, internal_tx, message);
        return;
    }
    let query = match view_data.search.submit() {
        Ok(FormOutcome::Query(query)) => query,
        Ok(FormOutcome::Values(_)) => return,
        Err(errors) => {
            let message = errors
                .first()
                .map(|error| format!("{}: {}", error.field, error.message))
                .unwrap_or_default();
            emit_status(state, view_data, internal_tx, message);
            return;
        }
    };

    let sort = if query.sort.is_empty() {
        std::mem::take(&mut view_data.query.sort)
    } else {
        query.sort
    };
    view_data.query = FormQuery {
        filter: query.filter,
        sort,
    };
    view_data.page = PageRequest::new(1, view_data.page.page_size);
    view_data.selected_row = 0;
    state.dispatch(ConsoleCommand::ExitToNav);
    match refresh_rows(runtime, view_data) {
        Ok(()) => {
            let message = format!("{} matching", view_data.total);
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("search failed: {error:#}"));
        }
    }
}

fn open_picker<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let (Some(row), Some(field)) = (view_data.selected_id(), view_data.selected_field().cloned())
    else {
        return;
    };
    let Some(binding) = field.remote.clone() else {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{} has no remote source", field.title),
        );
        return;
    };
    let model = match PickerModel::new(&binding, view_data.options.page_size) {
        Ok(model) => model,
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("picker failed: {error}"));
            return;
        }
    };

    let value = view_data
        .table
        .row(row)
        .and_then(|record| field.value_in(record))
        .cloned()
        .unwrap_or(Value::Null);
    let mut picker = PickerUi {
        target: PickerTarget {
            row,
            field: field.key(),
        },
        model,
        entry_cursor: 0,
        row_cursor: 0,
        filter_text: String::new(),
        filter: Record::new(),
        filter_input: None,
        sort: None,
    };
    let events = picker.model.set_value(&value);
    view_data.picker = Some(picker);
    state.dispatch(ConsoleCommand::OpenPicker);
    apply_selector_events(state, runtime, view_data, internal_tx, events);
}

fn apply_selector_events<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: Vec<SelectorEvent>,
) {
    for event in events {
        match event {
            SelectorEvent::NamesRequested(request) => {
                let Some(target) = view_data
                    .picker
                    .as_ref()
                    .map(|picker| picker.target.clone())
                else {
                    continue;
                };
                if let Err(error) = runtime.spawn_names(target, request, internal_tx.clone()) {
                    emit_status(state, view_data, internal_tx, format!("names failed: {error:#}"));
                }
            }
            SelectorEvent::FetchFailed(message) => {
                emit_status(state, view_data, internal_tx, format!("names failed: {message}"));
            }
            _ => {}
        }
    }
}

fn handle_picker_key<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(picker) = view_data.picker.as_mut() else {
        state.dispatch(ConsoleCommand::ExitToNav);
        return;
    };
    if picker.model.selector().modal().is_some() {
        handle_modal_key(state, runtime, view_data, internal_tx, key);
        return;
    }

    let listed = picker.model.listed();
    match key.code {
        KeyCode::Char('a') => open_modal(state, runtime, view_data, internal_tx, ModalMode::Select),
        KeyCode::Char('v') => open_modal(state, runtime, view_data, internal_tx, ModalMode::View),
        KeyCode::Char('j') | KeyCode::Down => {
            picker.entry_cursor = step(picker.entry_cursor, 1, listed.len());
        }
        KeyCode::Char('k') | KeyCode::Up => {
            picker.entry_cursor = step(picker.entry_cursor, -1, listed.len());
        }
        KeyCode::Char('J') => move_entry(state, runtime, view_data, internal_tx, 1),
        KeyCode::Char('K') => move_entry(state, runtime, view_data, internal_tx, -1),
        KeyCode::Char('x') | KeyCode::Delete => {
            let Some((id, _)) = listed.get(picker.entry_cursor).copied() else {
                return;
            };
            let events = picker.model.remove(id);
            picker.entry_cursor = picker
                .entry_cursor
                .min(picker.model.listed().len().saturating_sub(1));
            apply_selector_events(state, runtime, view_data, internal_tx, events);
        }
        KeyCode::Enter => save_picker(state, runtime, view_data, internal_tx),
        KeyCode::Esc => {
            view_data.picker = None;
            state.dispatch(ConsoleCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "selection discarded");
        }
        _ => {}
    }
}

/// Opens the modal with a fresh filter and sort.
fn open_modal<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mode: ModalMode,
) {
    let Some(picker) = view_data.picker.as_mut() else {
        return;
    };
    picker.row_cursor = 0;
    picker.filter_text.clear();
    picker.filter = Record::new();
    picker.filter_input = None;
    picker.sort = None;
    let events = picker.model.dispatch(SelectorCommand::Toggle(mode));
    apply_selector_events(state, runtime, view_data, internal_tx, events);
    fetch_modal_page(state, runtime, view_data, internal_tx, 1);
}

fn fetch_modal_page<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    current: usize,
) {
    let page_size = view_data.options.page_size;
    let Some(picker) = view_data.picker.as_mut() else {
        return;
    };
    let sort = picker.sort_keys();
    let result = picker.model.fetch_data(
        runtime,
        PageRequest::new(current, page_size),
        &sort,
        &picker.filter,
    );
    match result {
        Ok(fetched) => {
            picker.row_cursor = picker.row_cursor.min(fetched.data.len().saturating_sub(1));
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("fetch failed: {error:#}"));
        }
    }
}

fn move_entry<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let Some(picker) = view_data.picker.as_mut() else {
        return;
    };
    if matches!(picker.model, PickerModel::Single(_)) {
        emit_status(state, view_data, internal_tx, "single selection has no order");
        return;
    }
    let old_index = picker.entry_cursor;
    let new_index = step(old_index, delta, picker.model.listed().len());
    if new_index == old_index {
        return;
    }
    let events = picker.model.move_entry(old_index, new_index);
    picker.entry_cursor = new_index;
    apply_selector_events(state, runtime, view_data, internal_tx, events);
}

fn handle_modal_key<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(picker) = view_data.picker.as_mut() else {
        return;
    };
    if let Some(input) = picker.filter_input.as_mut() {
        match key.code {
            KeyCode::Char(ch) => input.push(ch),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => picker.filter_input = None,
            KeyCode::Enter => {
                let text = input.clone();
                let parsed =
                    parse_modal_filter(&text, picker.model.selector().select_fields());
                match parsed {
                    Ok(filter) => {
                        picker.filter_text = text;
                        picker.filter = filter;
                        picker.filter_input = None;
                        picker.row_cursor = 0;
                        fetch_modal_page(state, runtime, view_data, internal_tx, 1);
                    }
                    Err(message) => emit_status(state, view_data, internal_tx, message),
                }
            }
            _ => {}
        }
        return;
    }

    let rows = picker.model.selector().rows().len();
    let pagination = picker.model.selector().pagination();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            picker.row_cursor = step(picker.row_cursor, 1, rows);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            picker.row_cursor = step(picker.row_cursor, -1, rows);
        }
        KeyCode::Char('/') => {
            picker.filter_input = Some(picker.filter_text.clone());
        }
        KeyCode::Char('s') => {
            picker.cycle_sort();
            picker.row_cursor = 0;
            fetch_modal_page(state, runtime, view_data, internal_tx, 1);
        }
        KeyCode::Char(' ') => {
            let Some(row) = picker.model.selector().rows().get(picker.row_cursor) else {
                return;
            };
            let Some(id) = row.id else {
                return;
            };
            let checked = !row.checked;
            let events = picker
                .model
                .dispatch(SelectorCommand::Check { id, checked });
            apply_selector_events(state, runtime, view_data, internal_tx, events);
        }
        KeyCode::Char('n') => {
            let shown = pagination.current.saturating_mul(pagination.page_size);
            if u64::try_from(shown).unwrap_or(u64::MAX) >= pagination.total {
                emit_status(state, view_data, internal_tx, "no more pages");
                return;
            }
            picker.row_cursor = 0;
            fetch_modal_page(state, runtime, view_data, internal_tx, pagination.current + 1);
        }
        KeyCode::Char('N') => {
            if pagination.current <= 1 {
                emit_status(state, view_data, internal_tx, "no more pages");
                return;
            }
            picker.row_cursor = 0;
            fetch_modal_page(state, runtime, view_data, internal_tx, pagination.current - 1);
        }
        KeyCode::Enter => {
            let events = picker.model.dispatch(SelectorCommand::Confirm);
            apply_selector_events(state, runtime, view_data, internal_tx, events);
        }
        KeyCode::Esc => {
            let events = picker.model.dispatch(SelectorCommand::Cancel);
            apply_selector_events(state, runtime, view_data, internal_tx, events);
        }
        _ => {}
    }
}

/// Writes the committed selection back into the row: one id (or null) for a
/// single binding, ids in entry order for a multi binding. Committed ids the
/// last fetch could not resolve trail the list.
fn save_picker<R: ConsoleRuntime + ?Sized>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(picker) = view_data.picker.take() else {
        return;
    };
    let value = picker.model.selector().value();

    let mut patch = Record::new();
    patch.insert("id".to_owned(), picker.target.row.to_value());
    if let Some(field) = view_data.index.get(&picker.target.field) {
        field.data_index.set(&mut patch, value);
    }
    let events = view_data.table.handle_save(patch);
    state.dispatch(ConsoleCommand::ExitToNav);
    if events.is_empty() {
        emit_status(state, view_data, internal_tx, "row is gone; nothing saved");
        return;
    }
    persist_row(
        state,
        runtime,
        view_data,
        internal_tx,
        picker.target.row,
        &picker.target.field,
    );
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ConsoleState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(view_data))
        .block(Block::default().title("procon").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    match state.mode {
        ConsoleMode::Search => {
            render_overlay(frame, 70, 60, "search", render_search_text(view_data));
        }
        ConsoleMode::Picker => {
            render_overlay(frame, 80, 70, "picker", render_picker_text(view_data));
        }
        ConsoleMode::Nav | ConsoleMode::Edit => {}
    }
    if state.show_errors {
        render_overlay(frame, 70, 50, "errors", render_errors_text(view_data));
    }
}

fn render_overlay(
    frame: &mut ratatui::Frame<'_>,
    percent_x: u16,
    percent_y: u16,
    title: &str,
    text: String,
) {
    let area = centered_rect(percent_x, percent_y, frame.area());
    frame.render_widget(Clear, area);
    let body = Paragraph::new(text).block(
        Block::default()
            .title(title.to_owned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(body, area);
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let widths = vec![Constraint::Min(8); view_data.columns.len().max(1)];
    let header = Row::new(table_header(view_data).into_iter().map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = view_data
        .table
        .rows()
        .iter()
        .enumerate()
        .map(|(row_index, record)| {
            let selected_row = row_index == view_data.selected_row;
            let cells = view_data
                .columns
                .iter()
                .enumerate()
                .map(|(column_index, key)| {
                    let (text, mut style) = match view_data.index.get(key) {
                        Some(field) => {
                            let rendered = view_data.renderer.render_field(field, record, row_index);
                            let text = cell_text(view_data, record, key, &rendered);
                            (text, cell_style(&rendered))
                        }
                        None => (String::new(), Style::default()),
                    };
                    if selected_row {
                        style = style.bg(Color::DarkGray);
                    }
                    if selected_row && column_index == view_data.selected_col {
                        style = Style::default()
                            .fg(Color::Black)
                            .bg(Color::Cyan)
                            .add_modifier(Modifier::BOLD);
                    }
                    Cell::from(text).style(style)
                })
                .collect::<Vec<_>>();
            Row::new(cells)
        });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(view_data.options.api.clone())
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn header_text(view_data: &ViewData) -> String {
    let mut text = format!(
        "{}/{}  page {}/{}  {} rows",
        view_data.options.page_id,
        view_data.options.api,
        view_data.page.current,
        view_data.page_count(),
        view_data.total
    );
    if !view_data.query.filter.is_empty() {
        let filter = serde_json::to_string(&view_data.query.filter).unwrap_or_default();
        text.push_str(&format!("  filter {filter}"));
    }
    text
}

fn table_header(view_data: &ViewData) -> Vec<String> {
    view_data
        .columns
        .iter()
        .map(|key| {
            let mut label = view_data
                .index
                .get(key)
                .map(|field| field.title.clone())
                .unwrap_or_else(|| key.clone());
            match view_data.query.sort.iter().find(|sort| &sort.field == key) {
                Some(sort) if sort.order == SortOrder::Ascend => {
                    label.push(' ');
                    label.push_str(SORT_MARK_ASC);
                }
                Some(_) => {
                    label.push(' ');
                    label.push_str(SORT_MARK_DESC);
                }
                None => {}
            }
            label
        })
        .collect()
}

fn cell_text(view_data: &ViewData, record: &Record, key: &str, rendered: &Rendered) -> String {
    let row = record.get("id").and_then(EntityId::from_value);
    match row {
        Some(row) if view_data.table.is_editing(row, key) => {
            format!("{}{EDIT_CARET}", pending_text(&view_data.table, row, key))
        }
        _ => rendered.plain(),
    }
}

fn cell_style(rendered: &Rendered) -> Style {
    match rendered {
        Rendered::Percent {
            trend: Trend::Up, ..
        } => Style::default().fg(Color::Green),
        Rendered::Percent {
            trend: Trend::Down,
            ..
        } => Style::default().fg(Color::Red),
        Rendered::Progress { status, .. } => match status {
            ProgressStatus::Success => Style::default().fg(Color::Green),
            ProgressStatus::Exception => Style::default().fg(Color::Red),
            ProgressStatus::Active => Style::default().fg(Color::Cyan),
        },
        Rendered::Placeholder(_) => Style::default().fg(Color::DarkGray),
        Rendered::Switch(false) => Style::default().fg(Color::DarkGray),
        _ => Style::default(),
    }
}

fn status_text(state: &ConsoleState, view_data: &ViewData) -> String {
    let modal_open = view_data
        .picker
        .as_ref()
        .is_some_and(|picker| picker.model.selector().modal().is_some());
    let filter_open = view_data
        .picker
        .as_ref()
        .is_some_and(|picker| picker.filter_input.is_some());
    let hints = match state.mode {
        ConsoleMode::Nav => "j/k row  h/l col  i edit  / search  p pick  s sort  n/N page  ! errors  q quit",
        ConsoleMode::Edit => "enter edit  enter/tab commit  esc cancel",
        ConsoleMode::Search => "tab next  enter apply  ctrl+e more  ctrl+r reset  esc back",
        ConsoleMode::Picker if filter_open => "field=value; ...  enter apply  esc back",
        ConsoleMode::Picker if modal_open => {
            "j/k row  space check  / filter  s sort  n/N page  enter confirm  esc cancel"
        }
        ConsoleMode::Picker => "a add  v view  J/K move  x remove  enter save  esc discard",
    };
    let mut parts = vec![state.mode.label().to_owned()];
    if let Some(status) = state.status_line.as_ref().filter(|status| !status.is_empty()) {
        parts.push(status.clone());
    }
    let errors = view_data.table.errors().len();
    if errors > 0 {
        parts.push(format!("{errors} invalid"));
    }
    parts.push(hints.to_owned());
    parts.join(" | ")
}

fn render_search_text(view_data: &ViewData) -> String {
    let mut lines = Vec::new();
    for (index, item) in view_data.search.items(&view_data.renderer).iter().enumerate() {
        let marker = if index == view_data.search_cursor {
            CURSOR_MARK
        } else {
            " "
        };
        let value = if index == view_data.search_cursor {
            format!("{}{EDIT_CARET}", view_data.search_buffer)
        } else if item.value.is_null() {
            String::new()
        } else {
            item.display.plain()
        };
        lines.push(format!(
            "{marker} {} ({}): {value}",
            item.field.title,
            item.input.label()
        ));
    }
    let hidden = view_data.search.hidden_count();
    if hidden > 0 {
        lines.push(format!("  {hidden} more (ctrl+e)"));
    }
    lines.join("\n")
}

fn render_picker_text(view_data: &ViewData) -> String {
    let Some(picker) = &view_data.picker else {
        return String::new();
    };
    let selector = picker.model.selector();
    let mut lines = Vec::new();

    let title = view_data
        .index
        .get(&picker.target.field)
        .map_or(picker.target.field.as_str(), |field| field.title.as_str());
    lines.push(format!("{title} for row {}", picker.target.row));
    let listed = picker.model.listed();
    if listed.is_empty() {
        lines.push("  (nothing selected)".to_owned());
    }
    for (index, (id, position)) in listed.iter().enumerate() {
        let marker = if index == picker.entry_cursor && selector.modal().is_none() {
            CURSOR_MARK
        } else {
            " "
        };
        let name = selector
            .names()
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("#{id}"));
        lines.push(format!("{marker} {position}. {name}"));
    }

    let Some(mode) = selector.modal() else {
        return lines.join("\n");
    };
    let heading = match mode {
        ModalMode::Select => "choose",
        ModalMode::View => "selected",
    };
    let pagination = selector.pagination();
    let pages = usize::try_from(pagination.total)
        .unwrap_or(usize::MAX)
        .div_ceil(pagination.page_size.max(1))
        .max(1);
    lines.push(String::new());
    lines.push(format!(
        "-- {heading} (page {}/{pages}, {} total) --",
        pagination.current, pagination.total
    ));
    match &picker.filter_input {
        Some(input) => lines.push(format!("filter: {input}{EDIT_CARET}")),
        None if !picker.filter_text.is_empty() => {
            lines.push(format!("filter: {}", picker.filter_text));
        }
        None => {}
    }
    if let Some(sort) = picker.sort_keys().first() {
        let title = selector
            .select_fields()
            .iter()
            .find(|field| field.field == sort.field)
            .map_or(sort.field.as_str(), |field| field.label.as_str());
        lines.push(format!("sort: {title} {}", sort.order.as_backend()));
    }
    for (index, row) in selector.rows().iter().enumerate() {
        let marker = if index == picker.row_cursor {
            CURSOR_MARK
        } else {
            " "
        };
        let check = if row.checked { "[x]" } else { "[ ]" };
        let labels: Vec<String> = selector
            .select_fields()
            .iter()
            .map(|field| {
                row.record
                    .get(&field.field)
                    .map(|value| input_text(Some(value)))
                    .unwrap_or_default()
            })
            .collect();
        lines.push(format!("{marker} {check} {}", labels.join(" | ")));
    }
    lines.join("\n")
}

fn render_errors_text(view_data: &ViewData) -> String {
    let errors = view_data.table.errors();
    if errors.is_empty() {
        return "no validation errors".to_owned();
    }
    errors.lines().join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
