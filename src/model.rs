use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use chrono::{Local, NaiveDate, Utc};
use ratatui::crossterm::event::KeyEvent;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, trace, warn};

use crate::client::RelayClient;
use crate::documents::{Document, display_value};
use crate::domain::{BoardConfig, BoardError, CmdMode, HELP_TEXT, Message};
use crate::expiry::ExpiryPolicy;
use crate::export::{ExportOptions, TablePdf, build_report, export_to_file};
use crate::inputter::{InputResult, Inputter};
use crate::session::Session;
use crate::table::{DocumentTable, SortKey};

pub const LABEL_HEADER: &str = "Label";
pub const CREATED_HEADER: &str = "Créé le";

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Loading,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    Login,
    Table,
    Record,
    Popup,
    CmdInput,
}

/// Results coming back from the relay task.
pub enum Outcome {
    LoggedIn(Result<Session, BoardError>),
    Fetched(Result<Vec<Document>, BoardError>),
}

/// What the UI needs to draw one row of the current page.
#[derive(Debug, Clone)]
pub struct RowView {
    pub cells: Vec<String>,
    pub expired: bool,
}

pub struct UIData {
    pub headers: Vec<String>,
    pub rows: Vec<RowView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page: usize,
    pub page_count: usize,
    pub nrows: usize,
    pub total_rows: usize,
    pub record: Vec<(String, String)>,
    pub record_offset: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CmdMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub filter_summary: String,
    pub include_expired: bool,
    pub username: Option<String>,
    pub loading: bool,
    pub modus: Modus,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            headers: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            page: 1,
            page_count: 1,
            nrows: 0,
            total_rows: 0,
            record: Vec::new(),
            record_offset: 0,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            filter_summary: String::new(),
            include_expired: true,
            username: None,
            loading: false,
            modus: Modus::Login,
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: BoardConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: DocumentTable,
    today: NaiveDate,
    client: RelayClient,
    runtime: Runtime,
    pending: Option<Receiver<Outcome>>,
    session: Option<Session>,
    username: String,
    curser_row: usize,
    curser_column: usize,
    record_idx: usize,
    record_offset: usize,
    include_expired: bool,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CmdMode>,
    last_input: InputResult,
    active_cmdinput: bool,
}

impl Model {
    pub fn init(config: &BoardConfig) -> Result<Self, BoardError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let expiry = ExpiryPolicy::new(config.expiry_fields.clone());

        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Login,
            previous_modus: Modus::Login,
            table: DocumentTable::new(config.page_size, expiry),
            today: Local::now().date_naive(),
            client: RelayClient::new(config.relay_url.clone()),
            runtime,
            pending: None,
            session: None,
            username: String::new(),
            curser_row: 0,
            curser_column: 0,
            record_idx: 0,
            record_offset: 0,
            include_expired: config.include_expired,
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
        };
        model.start_login();
        model.set_status_message(format!("Relay {}", model.client.base_url()));
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.uidata.status_message = message.into();
        self.uidata.last_update = Instant::now();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), BoardError> {
        self.poll_pending();

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(),
                    Message::MoveUp => self.move_table_selection_up(),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::NextPage => self.change_page(|t| t.next_page()),
                    Message::PrevPage => self.change_page(|t| t.prev_page()),
                    Message::FirstPage => self.change_page(|t| t.goto_page(1)),
                    Message::LastPage => self.change_page(|t| t.goto_page(t.page_count())),
                    Message::Sort => self.sort_current_column(),
                    Message::Filter => self.enter_cmd_mode(CmdMode::FilterTable),
                    Message::FilterColumn => self.enter_column_filter(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Export => self.export(),
                    Message::ToggleExportExpired => self.toggle_export_expired(),
                    Message::Refresh => self.fetch_documents(),
                    Message::Enter => self.enter(),
                    Message::Logout => self.logout(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::Record => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_record_selection(1),
                    Message::MoveUp => self.move_record_selection(-1),
                    Message::MoveLeft => self.previous_record(),
                    Message::MoveRight => self.next_record(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::Login | Modus::CmdInput => match msg {
                    Message::Quit => self.quit(),
                    Message::RawKey(key) => self.raw_input(key),
                    _ => (),
                },
            }
        }

        self.uidata.modus = self.modus;
        self.uidata.loading = self.is_loading();
        Ok(())
    }

    // -------------------- Relay calls ---------------------- //

    fn spawn<F>(&mut self, job: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.runtime.spawn(async move {
            if tx.send(job.await).is_err() {
                debug!("Dashboard is gone, dropping relay result");
            }
        });
        self.pending = Some(rx);
        self.status = Status::Loading;
        self.uidata.loading = true;
    }

    fn poll_pending(&mut self) {
        let Some(rx) = &self.pending else {
            return;
        };
        match rx.try_recv() {
            Ok(outcome) => {
                self.pending = None;
                self.status = Status::Ready;
                self.apply(outcome);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                warn!("Relay task ended without a result");
                self.pending = None;
                self.status = Status::Ready;
                self.set_status_message("Request aborted");
            }
        }
    }

    fn login(&mut self, password: String) {
        if self.is_loading() {
            debug!("Relay call in flight, keeping the password prompt");
            self.enter_cmd_mode(CmdMode::Password);
            self.set_status_message("Still waiting for the relay, try again");
            return;
        }
        let client = self.client.clone();
        let username = self.username.clone();
        info!("Logging in as {username}");
        self.set_status_message(format!("Logging in as {username} ..."));
        self.spawn(async move { Outcome::LoggedIn(client.login(&username, &password).await) });
    }

    fn fetch_documents(&mut self) {
        if self.is_loading() {
            debug!("Fetch already in flight");
            return;
        }
        let Some(session) = self.session.clone() else {
            self.start_login();
            return;
        };
        if session.is_stale(Utc::now()) {
            info!("Session is older than the cookie lifetime, logging in again");
            self.session = None;
            self.start_login();
            self.set_status_message("Session expired, please log in again");
            return;
        }
        let client = self.client.clone();
        self.set_status_message("Loading documents ...");
        self.spawn(async move { Outcome::Fetched(client.fetch_documents(&session).await) });
    }

    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::LoggedIn(Ok(session)) => {
                self.session = Some(session);
                self.uidata.username = Some(self.username.clone());
                self.modus = Modus::Table;
                self.previous_modus = Modus::Login;
                self.set_status_message(format!("Welcome {}", self.username));
                self.fetch_documents();
            }
            Outcome::LoggedIn(Err(BoardError::Authentication)) => {
                warn!("Login rejected for {}", self.username);
                self.start_login();
                self.set_status_message("Invalid credentials");
            }
            Outcome::LoggedIn(Err(e)) => {
                error!("Login failed: {e}");
                self.start_login();
                self.set_status_message(format!("Login failed: {e}"));
            }
            Outcome::Fetched(Ok(documents)) => {
                let count = documents.len();
                self.today = Local::now().date_naive();
                self.table.replace_snapshot(documents);
                self.clamp_selection();
                self.update_table_data();
                self.set_status_message(format!("Loaded {count} documents"));
            }
            Outcome::Fetched(Err(BoardError::Authentication)) => {
                warn!("Session rejected by the relay");
                self.session = None;
                self.start_login();
                self.set_status_message("Session expired, please log in again");
            }
            Outcome::Fetched(Err(e)) => {
                error!("Fetch failed: {e}");
                self.update_table_data();
                self.show_error(format!("Fetch failed: {e}"));
            }
        }
    }

    /// Dropping the receiver discards whatever the in-flight call returns.
    fn logout(&mut self) {
        self.pending = None;
        self.status = Status::Ready;
        if let Some(session) = self.session.take() {
            let client = self.client.clone();
            self.runtime.spawn(async move {
                if let Err(e) = client.logout(&session).await {
                    debug!("Logout call failed: {e}");
                }
            });
        }
        self.table.replace_snapshot(Vec::new());
        self.uidata.username = None;
        self.start_login();
        self.set_status_message("Logged out");
    }

    // -------------------- Control handling functions ---------------------- //

    fn start_login(&mut self) {
        self.modus = Modus::Login;
        self.previous_modus = Modus::Login;
        self.uidata.username = None;
        self.enter_cmd_mode(CmdMode::Username);
        self.input.set(&self.username);
        self.sync_input();
    }

    fn enter(&mut self) {
        if self.modus == Modus::Table && self.table.visible_len() > 0 {
            self.record_idx = self.table.page_offset() + self.curser_row;
            self.record_offset = 0;
            self.previous_modus = Modus::Table;
            self.modus = Modus::Record;
            self.update_record_data();
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::Record => {
                self.previous_modus = Modus::Record;
                self.modus = Modus::Table;
                self.update_table_data();
            }
            Modus::Popup => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::Popup;
                self.uidata.show_popup = false;
                self.uidata.last_update = Instant::now();
            }
            Modus::Table | Modus::Login | Modus::CmdInput => {}
        }
    }

    fn show_help(&mut self) {
        if self.modus != Modus::Popup {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::Popup;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    /// Errors pop up unless the user is typing, then they only reach the status line.
    fn show_error(&mut self, message: String) {
        if matches!(self.modus, Modus::Table | Modus::Record) {
            self.show_help();
            self.uidata.popup_message = message.clone();
        }
        self.set_status_message(message);
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
            self.sync_input();
        }
    }

    fn sync_input(&mut self) {
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.last_update = Instant::now();
    }

    fn enter_cmd_mode(&mut self, mode: CmdMode) {
        trace!("Entering command mode {mode:?}");
        if self.modus != Modus::Login {
            self.previous_modus = self.modus;
            self.modus = Modus::CmdInput;
        }
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.input.set_masked(mode == CmdMode::Password);
        if mode == CmdMode::FilterTable {
            self.input.set(self.table.filter());
        }
        self.sync_input();
    }

    fn enter_column_filter(&mut self) {
        let Some(column) = self.selected_metadata_column() else {
            self.set_status_message("Column filters apply to metadata columns only");
            return;
        };
        let current = self
            .table
            .column_filters()
            .get(&column)
            .cloned()
            .unwrap_or_default();
        self.enter_cmd_mode(CmdMode::FilterColumn);
        self.input.set(&current);
        self.sync_input();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input for {:?}", self.cmd_mode);
        let mode = self.cmd_mode.take();
        let canceled = self.last_input.canceled;
        let cmd_input = self.last_input.input.clone();

        self.active_cmdinput = false;
        if self.modus == Modus::CmdInput {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CmdInput;
        }

        match mode {
            Some(CmdMode::Username) if canceled => self.quit(),
            Some(CmdMode::Username) => {
                self.username = cmd_input.trim().to_string();
                if self.username.is_empty() {
                    self.set_status_message("Username is required");
                    self.enter_cmd_mode(CmdMode::Username);
                } else {
                    self.enter_cmd_mode(CmdMode::Password);
                }
            }
            Some(CmdMode::Password) if canceled => self.start_login(),
            Some(CmdMode::Password) => {
                if cmd_input.is_empty() {
                    self.set_status_message("Password is required");
                    self.enter_cmd_mode(CmdMode::Password);
                } else {
                    self.login(cmd_input);
                }
            }
            Some(_) if canceled => {}
            Some(CmdMode::FilterTable) => {
                self.table.set_filter(&cmd_input);
                self.after_filter_change();
            }
            Some(CmdMode::FilterColumn) => {
                if let Some(column) = self.selected_metadata_column() {
                    self.table.set_column_filter(&column, &cmd_input);
                    self.after_filter_change();
                }
            }
            None => info!("Cmd mode is none!"),
        }
    }

    fn after_filter_change(&mut self) {
        self.curser_row = 0;
        self.update_table_data();
        self.set_status_message(format!("{} matching documents", self.table.visible_len()));
    }

    fn clear_filters(&mut self) {
        self.table.clear_filters();
        self.after_filter_change();
    }

    fn sort_current_column(&mut self) {
        let key = self.sort_key(self.curser_column);
        self.table.sort_by(key);
        self.update_table_data();
    }

    fn toggle_export_expired(&mut self) {
        self.include_expired = !self.include_expired;
        self.uidata.include_expired = self.include_expired;
        self.set_status_message(if self.include_expired {
            "Exports include expired documents"
        } else {
            "Exports skip expired documents"
        });
    }

    fn export(&mut self) {
        let options = ExportOptions {
            include_expired: self.include_expired,
            today: Local::now().date_naive(),
        };
        let report = build_report(&self.table, &options);
        match export_to_file(&report, &TablePdf, &self.config.export_path) {
            Ok(path) => {
                self.set_status_message(format!("Exported {} rows to {}", report.rows.len(), path.display()))
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.show_error(format!("Export failed: {e}"));
            }
        }
    }

    // -------------------- Selection ---------------------- //

    fn column_count(&self) -> usize {
        self.table.display_columns().len() + 2
    }

    /// Column 0 is the label, the last one the creation time.
    fn sort_key(&self, column: usize) -> SortKey {
        if column == 0 {
            return SortKey::Label;
        }
        match self.table.display_columns().get(column - 1) {
            Some(name) => SortKey::Column(name.clone()),
            None => SortKey::Created,
        }
    }

    fn selected_metadata_column(&self) -> Option<String> {
        match self.sort_key(self.curser_column) {
            SortKey::Column(name) => Some(name),
            SortKey::Label | SortKey::Created => None,
        }
    }

    fn change_page(&mut self, navigate: impl FnOnce(&mut DocumentTable)) {
        navigate(&mut self.table);
        self.clamp_selection();
        self.update_table_data();
    }

    fn clamp_selection(&mut self) {
        let rows = self.table.page_rows().len();
        self.curser_row = self.curser_row.min(rows.saturating_sub(1));
        self.curser_column = self.curser_column.min(self.column_count() - 1);
    }

    fn move_table_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.table.page() > 1 {
            self.table.prev_page();
            self.curser_row = self.table.page_size() - 1;
        }
        self.clamp_selection();
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self) {
        if self.curser_row + 1 < self.table.page_rows().len() {
            self.curser_row += 1;
        } else if self.table.page() < self.table.page_count() {
            self.table.next_page();
            self.curser_row = 0;
        }
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.column_count() {
            self.curser_column += 1;
        }
        self.update_table_data();
    }

    fn move_record_selection(&mut self, step: isize) {
        let max = self.uidata.record.len().saturating_sub(1);
        self.record_offset = self.record_offset.saturating_add_signed(step).min(max);
        self.uidata.record_offset = self.record_offset;
        self.uidata.last_update = Instant::now();
    }

    fn previous_record(&mut self) {
        if self.record_idx > 0 {
            self.record_idx -= 1;
            self.update_record_data();
        }
    }

    fn next_record(&mut self) {
        if self.record_idx + 1 < self.table.visible_len() {
            self.record_idx += 1;
            self.update_record_data();
        }
    }

    // -------------------- UI data ---------------------- //

    fn update_table_data(&mut self) {
        let sort = self.table.sort_state();
        let arrow = |key: SortKey| {
            if sort.key.as_ref() == Some(&key) {
                format!(" {}", sort.direction.arrow())
            } else {
                String::new()
            }
        };

        let mut headers = vec![format!("{LABEL_HEADER}{}", arrow(SortKey::Label))];
        headers.extend(
            self.table
                .display_columns()
                .iter()
                .map(|c| format!("{c}{}", arrow(SortKey::Column(c.clone())))),
        );
        headers.push(format!("{CREATED_HEADER}{}", arrow(SortKey::Created)));

        let columns = self.table.display_columns();
        let rows: Vec<RowView> = self
            .table
            .page_rows()
            .into_iter()
            .map(|doc| {
                let mut cells = Vec::with_capacity(columns.len() + 2);
                cells.push(doc.label.clone());
                cells.extend(columns.iter().map(|c| display_value(doc, c).to_string()));
                cells.push(doc.created_display());
                RowView {
                    cells,
                    expired: self.table.is_expired(doc, self.today),
                }
            })
            .collect();

        let mut filters: Vec<String> = Vec::new();
        if !self.table.filter().is_empty() {
            filters.push(format!("/{}", self.table.filter()));
        }
        filters.extend(
            self.table
                .column_filters()
                .iter()
                .map(|(c, t)| format!("{c}={t}")),
        );

        self.uidata.headers = headers;
        self.uidata.rows = rows;
        self.uidata.selected_row = self.curser_row;
        self.uidata.selected_column = self.curser_column;
        self.uidata.page = self.table.page();
        self.uidata.page_count = self.table.page_count();
        self.uidata.nrows = self.table.visible_len();
        self.uidata.total_rows = self.table.documents().len();
        self.uidata.filter_summary = filters.join("  ");
        self.uidata.include_expired = self.include_expired;
        self.uidata.last_update = Instant::now();
    }

    fn update_record_data(&mut self) {
        let Some(doc) = self.table.visible_at(self.record_idx) else {
            return;
        };
        let mut record = vec![
            ("ID".to_string(), doc.id.to_string()),
            (LABEL_HEADER.to_string(), doc.label.clone()),
            (CREATED_HEADER.to_string(), doc.created_display()),
        ];
        record.extend(
            self.table
                .columns()
                .iter()
                .map(|c| (c.clone(), display_value(doc, c).to_string())),
        );
        if self.table.is_expired(doc, self.today) {
            let column = self.table.expiry_column().unwrap_or_default();
            record.push(("Statut".to_string(), format!("Expiré ({column})")));
        }

        self.uidata.record = record;
        self.record_offset = 0;
        self.uidata.record_offset = 0;
        self.uidata.last_update = Instant::now();
        trace!("Record view for row {}", self.record_idx);
    }
}

#[cfg(test)]
mod tests {
    use ratatui::crossterm::event::KeyCode;

    use super::*;

    fn model() -> Model {
        let config = BoardConfig::default()
            .with_relay_url("http://127.0.0.1:9/")
            .with_page_size(2);
        Model::init(&config).unwrap()
    }

    fn logged_in(documents: Vec<Document>) -> Model {
        let mut model = model();
        model.username = "alice".into();
        model.session = Some(Session::new("abc"));
        model.modus = Modus::Table;
        model.active_cmdinput = false;
        model.cmd_mode = None;
        model.apply(Outcome::Fetched(Ok(documents)));
        model
    }

    fn fixture() -> Vec<Document> {
        vec![
            Document::new(1, "A").with_metadata("Date-fin", "01-01-2020"),
            Document::new(2, "B").with_metadata("Date-fin", "01-01-2099"),
            Document::new(3, "C").with_metadata("Date-fin", "01-01-2099"),
        ]
    }

    fn type_line(model: &mut Model, text: &str) {
        for c in text.chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Char(c)))))
                .unwrap();
        }
        model
            .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Enter))))
            .unwrap();
    }

    #[test]
    fn starts_at_the_username_prompt() {
        let model = model();
        assert_eq!(model.modus, Modus::Login);
        assert!(model.raw_keyevents());
        assert_eq!(model.get_uidata().cmd_mode, Some(CmdMode::Username));
    }

    #[test]
    fn password_prompt_is_masked_and_escape_goes_back() {
        let mut model = model();
        type_line(&mut model, "alice");
        assert_eq!(model.cmd_mode, Some(CmdMode::Password));
        assert!(model.get_uidata().cmdinput.masked);

        model
            .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Esc))))
            .unwrap();
        assert_eq!(model.cmd_mode, Some(CmdMode::Username));
        assert_eq!(model.get_uidata().cmdinput.input, "alice");
    }

    #[test]
    fn escape_at_username_quits() {
        let mut model = model();
        model
            .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Esc))))
            .unwrap();
        assert_eq!(model.status, Status::Quitting);
    }

    #[test]
    fn rejected_login_returns_to_the_prompt() {
        let mut model = model();
        model.username = "alice".into();
        model.apply(Outcome::LoggedIn(Err(BoardError::Authentication)));
        assert_eq!(model.modus, Modus::Login);
        assert_eq!(model.get_uidata().status_message, "Invalid credentials");
        assert!(model.session.is_none());
    }

    #[test]
    fn fetched_documents_fill_the_first_page() {
        let model = logged_in(fixture());
        let ui = model.get_uidata();
        assert_eq!(ui.headers, ["Label", "Date-fin", "Créé le"]);
        assert_eq!(ui.rows.len(), 2);
        assert_eq!(ui.page_count, 2);
        assert!(ui.rows[0].expired);
        assert!(!ui.rows[1].expired);
        assert_eq!(ui.status_message, "Loaded 3 documents");
    }

    #[test]
    fn stale_session_goes_back_to_login() {
        let mut model = logged_in(fixture());
        model.apply(Outcome::Fetched(Err(BoardError::Authentication)));
        assert!(model.session.is_none());
        assert_eq!(model.modus, Modus::Login);
        assert_eq!(model.cmd_mode, Some(CmdMode::Username));
    }

    #[test]
    fn failed_fetch_keeps_the_previous_snapshot() {
        let mut model = logged_in(fixture());
        model.apply(Outcome::Fetched(Err(BoardError::Upstream("down".into()))));
        assert_eq!(model.table.documents().len(), 3);
        assert_eq!(model.modus, Modus::Popup);
        assert!(model.get_uidata().popup_message.contains("down"));

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus, Modus::Table);
    }

    #[test]
    fn selection_walks_across_pages() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.table.page(), 2);
        assert_eq!(model.get_uidata().selected_row, 0);

        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.get_uidata().selected_row, 0);

        model.update(Some(Message::MoveUp)).unwrap();
        assert_eq!(model.table.page(), 1);
        assert_eq!(model.get_uidata().selected_row, 1);

        model.update(Some(Message::LastPage)).unwrap();
        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.table.page(), 2);
    }

    #[test]
    fn sort_marks_the_header_and_toggles() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(model.get_uidata().headers[0], "Label ▲");
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(model.get_uidata().headers[0], "Label ▼");
        assert_eq!(model.get_uidata().rows[0].cells[0], "C");
    }

    #[test]
    fn filter_through_the_command_line() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::NextPage)).unwrap();
        model.update(Some(Message::Filter)).unwrap();
        assert_eq!(model.modus, Modus::CmdInput);
        type_line(&mut model, "a");

        assert_eq!(model.modus, Modus::Table);
        assert_eq!(model.table.page(), 1);
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 1);
        assert_eq!(ui.rows[0].cells[0], "A");
        assert_eq!(ui.filter_summary, "/a");

        model.update(Some(Message::ClearFilters)).unwrap();
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn column_filter_needs_a_metadata_column() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::FilterColumn)).unwrap();
        assert_eq!(model.modus, Modus::Table);

        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::FilterColumn)).unwrap();
        type_line(&mut model, "2099");
        assert_eq!(model.get_uidata().nrows, 2);
        assert_eq!(model.get_uidata().filter_summary, "Date-fin=2099");
    }

    #[test]
    fn record_view_and_back() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.modus, Modus::Record);
        assert!(
            model
                .get_uidata()
                .record
                .contains(&("Statut".to_string(), "Expiré (Date-fin)".to_string()))
        );
        model.update(Some(Message::MoveRight)).unwrap();
        assert!(
            model
                .get_uidata()
                .record
                .contains(&(LABEL_HEADER.to_string(), "B".to_string()))
        );
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus, Modus::Table);
    }

    #[test]
    fn help_popup_closes_on_escape() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_popup);
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.get_uidata().show_popup);
        assert_eq!(model.modus, Modus::Table);
    }

    #[test]
    fn export_writes_the_visible_rows() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("board.pdf");
        let mut model = logged_in(fixture());
        model.config.export_path = target.clone();

        model.update(Some(Message::ToggleExportExpired)).unwrap();
        model.update(Some(Message::Export)).unwrap();
        assert!(target.exists());
        assert!(model.get_uidata().status_message.starts_with("Exported 2 rows"));
    }

    #[test]
    fn logout_drops_session_and_rows() {
        let mut model = logged_in(fixture());
        model.update(Some(Message::Logout)).unwrap();
        assert!(model.session.is_none());
        assert_eq!(model.table.documents().len(), 0);
        assert_eq!(model.modus, Modus::Login);
    }

    #[test]
    fn logout_discards_the_fetch_in_flight() {
        let mut model = logged_in(fixture());
        let (tx, rx) = mpsc::channel();
        model.pending = Some(rx);
        model.status = Status::Loading;

        model.update(Some(Message::Logout)).unwrap();
        assert!(!model.is_loading());
        assert_eq!(model.status, Status::Ready);
        assert!(
            tx.send(Outcome::Fetched(Ok(vec![Document::new(9, "OLD-USER-DOC")])))
                .is_err()
        );

        type_line(&mut model, "bob");
        assert_eq!(model.cmd_mode, Some(CmdMode::Password));
        type_line(&mut model, "pw");
        assert!(model.is_loading());
        assert!(model.get_uidata().status_message.starts_with("Logging in as"));
        assert!(model.table.documents().is_empty());
    }

    #[test]
    fn refresh_waits_for_the_pending_fetch() {
        let mut model = logged_in(fixture());
        let (tx, rx) = mpsc::channel();
        model.pending = Some(rx);

        model.update(Some(Message::Refresh)).unwrap();
        model.update(Some(Message::Refresh)).unwrap();
        assert!(model.is_loading());

        tx.send(Outcome::Fetched(Ok(vec![Document::new(7, "Fresh")])))
            .unwrap();
        model.update(None).unwrap();
        assert!(!model.is_loading());
        assert_eq!(model.table.documents().len(), 1);
        assert_eq!(model.get_uidata().rows[0].cells[0], "Fresh");
    }

    #[test]
    fn login_while_loading_keeps_the_prompt() {
        let mut model = model();
        let (_tx, rx) = mpsc::channel::<Outcome>();
        model.pending = Some(rx);

        type_line(&mut model, "bob");
        type_line(&mut model, "pw");
        assert_eq!(model.modus, Modus::Login);
        assert_eq!(model.cmd_mode, Some(CmdMode::Password));
        assert!(model.raw_keyevents());
        assert_eq!(
            model.get_uidata().status_message,
            "Still waiting for the relay, try again"
        );
    }
}
