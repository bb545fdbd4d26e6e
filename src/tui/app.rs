//! TUI application state and main event loop

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;
use tokio_stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

use super::landing::{LandingMode, LandingState, Notice};
use super::{chat, notes, ui};
use crate::backend::Backend;
use crate::config::{BackendKind, Config};
use crate::error::ClientError;
use crate::models::Board;
use crate::ops;
use crate::sync::{SessionState, SessionWatcher};

/// Target frame rate for UI updates (~30 fps)
const FRAME_DURATION_MS: u64 = 33;

/// How long the success overlay shows before the landing view redirects.
const REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Active view. Navigation between these is the whole routing surface.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Home,
    WorldBoard,
    WorldChat,
}

/// Which operation an in-flight task belongs to.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Register,
    Login,
    Logout,
    AddNote,
    Reply,
    DeleteNote,
    SendMessage,
}

impl Op {
    /// Progress label while the operation is in flight.
    pub fn in_progress(self) -> &'static str {
        match self {
            Op::Register => "Registering...",
            Op::Login => "Logging in...",
            Op::Logout => "Logging out...",
            Op::AddNote => "Adding...",
            Op::Reply => "Posting reply...",
            Op::DeleteNote => "Deleting...",
            Op::SendMessage => "Sending...",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Op::Register => "Registration failed. Please try again.",
            Op::Login => "Login failed. Please try again.",
            Op::Logout => "Logout failed. Please try again.",
            Op::AddNote => "Failed to add note. Please try again.",
            Op::Reply => "Failed to add reply. Please try again.",
            Op::DeleteNote => "Failed to delete note. Please try again.",
            Op::SendMessage => "Failed to send message. Please try again.",
        }
    }
}

/// Events delivered back into the main loop from spawned work.
pub enum AppEvent {
    OpDone {
        op: Op,
        result: Result<(), ClientError>,
    },
    Navigate(View),
    SessionChanged,
}

/// Key-driven actions that need `&mut self` after a view borrow ends.
enum Action {
    None,
    SubmitNote,
    SubmitReply { from_board: bool },
    DeleteNote,
    SendMessage,
    Logout,
    Go(View),
    Quit,
}

/// Application state
pub struct App {
    backend: Backend,
    session: SessionWatcher,
    pub view: View,
    pub landing: LandingState,
    pub home: Option<notes::HomeState>,
    pub board: Option<notes::BoardState>,
    pub chat: Option<chat::ChatState>,
    /// Transient, dismissible message (Esc clears it).
    pub status_message: Option<String>,
    pub status_is_error: bool,
    /// The operation currently in flight, if any. Set before dispatch,
    /// cleared when its completion event arrives, success or failure.
    pub pending: Option<Op>,
    pub should_exit: bool,
    events_tx: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    fn new(
        backend: Backend,
        session: SessionWatcher,
        events_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        // A restored session skips the landing form.
        if session.identity().is_some() {
            let _ = events_tx.send(AppEvent::Navigate(View::Home));
        }
        Self {
            backend,
            session,
            view: View::Landing,
            landing: LandingState::default(),
            home: None,
            board: None,
            chat: None,
            status_message: None,
            status_is_error: false,
            pending: None,
            should_exit: false,
            events_tx,
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session.current()
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_is_error = true;
    }

    /// Spawn an operation task. Its result comes back as an `OpDone`
    /// event, which clears `pending` whatever the outcome.
    fn dispatch<F>(&mut self, op: Op, fut: F)
    where
        F: std::future::Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        if self.pending.is_some() {
            return;
        }
        self.pending = Some(op);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fut.await;
            // If the view is gone by now the event is simply discarded.
            let _ = tx.send(AppEvent::OpDone { op, result });
        });
    }

    /// Switch views. The old view's state drops here, releasing its
    /// subscriptions and (for chat) the retention sweeper.
    async fn navigate(&mut self, view: View) {
        self.home = None;
        self.board = None;
        self.chat = None;
        self.status_message = None;
        self.landing.notice = None;
        self.landing.submitting = false;

        match view {
            View::Landing => {
                self.view = View::Landing;
            }
            View::Home => {
                let Some(identity) = self.session.identity() else {
                    self.view = View::Landing;
                    return;
                };
                match notes::HomeState::open(&self.backend.store, &identity).await {
                    Ok(state) => {
                        self.home = Some(state);
                        self.view = View::Home;
                    }
                    Err(err) => {
                        self.view = View::Landing;
                        self.set_error(err.to_string());
                    }
                }
            }
            View::WorldBoard => match notes::BoardState::open(&self.backend.store).await {
                Ok(state) => {
                    self.board = Some(state);
                    self.view = View::WorldBoard;
                }
                Err(err) => {
                    self.view = View::Landing;
                    self.set_error(err.to_string());
                }
            },
            View::WorldChat => match chat::ChatState::open(&self.backend.store).await {
                Ok(state) => {
                    self.chat = Some(state);
                    self.view = View::WorldChat;
                }
                Err(err) => {
                    self.view = View::Landing;
                    self.set_error(err.to_string());
                }
            },
        }
    }

    async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Navigate(view) => self.navigate(view).await,
            AppEvent::SessionChanged => self.on_session_changed().await,
            AppEvent::OpDone { op, result } => self.on_op_done(op, result).await,
        }
    }

    /// A remote logout (or any flip to anonymous) bounces gated views back
    /// to the landing page, tearing their subscriptions down with them.
    async fn on_session_changed(&mut self) {
        if self.session.identity().is_none() && self.view != View::Landing {
            self.navigate(View::Landing).await;
        }
    }

    async fn on_op_done(&mut self, op: Op, result: Result<(), ClientError>) {
        self.pending = None;
        match op {
            Op::Login | Op::Register => {
                self.landing.submitting = false;
                match result {
                    Ok(()) => {
                        self.landing.notice = Some(Notice::Success);
                        let tx = self.events_tx.clone();
                        tokio::spawn(async move {
                            time::sleep(REDIRECT_DELAY).await;
                            let _ = tx.send(AppEvent::Navigate(View::Home));
                        });
                    }
                    Err(err) => {
                        self.landing.notice = Some(Notice::Error(err.to_string()));
                    }
                }
            }
            Op::Logout => match result {
                Ok(()) => self.navigate(View::Landing).await,
                Err(_) => self.set_error(op.failure_message()),
            },
            Op::AddNote => match result {
                Ok(()) => {
                    if let Some(home) = &mut self.home {
                        home.compose_input.clear();
                        home.composing = false;
                    }
                }
                Err(ClientError::Validation(message)) => self.set_error(message),
                Err(_) => self.set_error(op.failure_message()),
            },
            Op::Reply => match result {
                Ok(()) => {
                    if let Some(home) = &mut self.home {
                        home.reply_input.clear();
                        home.replying = false;
                    }
                    if let Some(board) = &mut self.board {
                        board.reply_input.clear();
                        board.replying = false;
                    }
                }
                Err(ClientError::Validation(message)) => self.set_error(message),
                Err(_) => self.set_error(op.failure_message()),
            },
            Op::DeleteNote => {
                if result.is_err() {
                    self.set_error(op.failure_message());
                }
            }
            Op::SendMessage => match result {
                Ok(()) => {
                    if let Some(chat) = &mut self.chat {
                        chat.input.clear();
                    }
                }
                Err(ClientError::Validation(message)) => self.set_error(message),
                Err(_) => self.set_error(op.failure_message()),
            },
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        // Ctrl-C always exits.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return;
        }
        // Esc dismisses a transient message before anything else.
        if key.code == KeyCode::Esc && self.status_message.is_some() {
            self.status_message = None;
            return;
        }
        // Nothing renders while the session is still unknown.
        if self.session_state().is_unknown() {
            return;
        }

        let action = match self.view {
            View::Landing => {
                self.handle_landing_key(key);
                Action::None
            }
            View::Home => self.home_action(key),
            View::WorldBoard => self.board_action(key),
            View::WorldChat => self.chat_action(key),
        };

        match action {
            Action::None => {}
            Action::Quit => self.should_exit = true,
            Action::Go(view) => self.navigate(view).await,
            Action::Logout => self.submit_logout(),
            Action::SubmitNote => self.submit_note(),
            Action::SubmitReply { from_board } => self.submit_reply(from_board),
            Action::DeleteNote => self.delete_selected_note(),
            Action::SendMessage => self.submit_message(),
        }
    }

    fn handle_landing_key(&mut self, key: KeyEvent) {
        if self.landing.notice.is_some() {
            // Error overlays close on Esc; the success overlay redirects
            // on its own timer.
            if key.code == KeyCode::Esc && matches!(self.landing.notice, Some(Notice::Error(_))) {
                self.landing.notice = None;
            }
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('t') {
                self.landing.toggle_mode();
            }
            return;
        }
        match key.code {
            KeyCode::Tab => self.landing.toggle_field(),
            KeyCode::Backspace => {
                self.landing.input_mut().pop();
            }
            KeyCode::Enter => self.submit_landing(),
            KeyCode::Char(c) => self.landing.input_mut().push(c),
            _ => {}
        }
    }

    fn submit_landing(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let email = self.landing.email.clone();
        let password = self.landing.password.clone();
        let auth = self.backend.auth.clone();
        self.landing.submitting = true;
        match self.landing.mode {
            LandingMode::Login => self.dispatch(Op::Login, async move {
                auth.login(&email, &password).await.map(|_| ())
            }),
            LandingMode::Register => self.dispatch(Op::Register, async move {
                auth.register(&email, &password).await.map(|_| ())
            }),
        }
    }

    fn home_action(&mut self, key: KeyEvent) -> Action {
        let Some(home) = self.home.as_mut() else {
            return Action::None;
        };
        if home.composing {
            match key.code {
                KeyCode::Esc => home.composing = false,
                KeyCode::Tab => {
                    home.compose_target = match home.compose_target {
                        Board::Local => Board::World,
                        Board::World => Board::Local,
                    }
                }
                KeyCode::Backspace => {
                    home.compose_input.pop();
                }
                KeyCode::Enter => return Action::SubmitNote,
                KeyCode::Char(c) => home.compose_input.push(c),
                _ => {}
            }
            return Action::None;
        }
        if home.replying {
            match key.code {
                KeyCode::Esc => home.replying = false,
                KeyCode::Backspace => {
                    home.reply_input.pop();
                }
                KeyCode::Enter => return Action::SubmitReply { from_board: false },
                KeyCode::Char(c) => home.reply_input.push(c),
                _ => {}
            }
            return Action::None;
        }
        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('w') => {
                home.composing = true;
                Action::None
            }
            KeyCode::Char('r') => {
                if home.selected_id().is_some() {
                    home.replying = true;
                }
                Action::None
            }
            KeyCode::Char('d') => Action::DeleteNote,
            KeyCode::Char('b') => Action::Go(View::WorldBoard),
            KeyCode::Char('c') => Action::Go(View::WorldChat),
            KeyCode::Char('l') => Action::Logout,
            KeyCode::Up => {
                home.select_prev();
                Action::None
            }
            KeyCode::Down => {
                home.select_next();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn board_action(&mut self, key: KeyEvent) -> Action {
        let Some(board) = self.board.as_mut() else {
            return Action::None;
        };
        if board.replying {
            match key.code {
                KeyCode::Esc => board.replying = false,
                KeyCode::Backspace => {
                    board.reply_input.pop();
                }
                KeyCode::Enter => return Action::SubmitReply { from_board: true },
                KeyCode::Char(c) => board.reply_input.push(c),
                _ => {}
            }
            return Action::None;
        }
        match key.code {
            KeyCode::Esc => Action::Go(View::Home),
            KeyCode::Char('r') => {
                if board.selected_id().is_some() {
                    board.replying = true;
                }
                Action::None
            }
            KeyCode::Up => {
                board.select_prev();
                Action::None
            }
            KeyCode::Down => {
                board.select_next();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn chat_action(&mut self, key: KeyEvent) -> Action {
        let Some(chat) = self.chat.as_mut() else {
            return Action::None;
        };
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('b') {
                if let Some(author) = chat.selected_author() {
                    chat.blocks.block(&author);
                    chat.selected = 0;
                }
            }
            return Action::None;
        }
        match key.code {
            KeyCode::Esc => Action::Go(View::Home),
            KeyCode::Enter => Action::SendMessage,
            KeyCode::Backspace => {
                chat.input.pop();
                Action::None
            }
            KeyCode::Up => {
                chat.select_prev();
                Action::None
            }
            KeyCode::Down => {
                chat.select_next();
                Action::None
            }
            KeyCode::Char(c) => {
                chat.input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    fn submit_logout(&mut self) {
        let auth = self.backend.auth.clone();
        self.dispatch(Op::Logout, async move { auth.logout().await });
    }

    fn submit_note(&mut self) {
        let Some(home) = self.home.as_ref() else {
            return;
        };
        let content = home.compose_input.clone();
        let board = home.compose_target;
        let identity = self.session.identity();
        let store = Arc::clone(&self.backend.store);
        self.dispatch(Op::AddNote, async move {
            ops::add_note(&store, &content, board, identity.as_ref())
                .await
                .map(|_| ())
        });
    }

    fn submit_reply(&mut self, from_board: bool) {
        let target = if from_board {
            self.board
                .as_ref()
                .and_then(|b| b.selected_id().map(|id| (b.notes.handle(), id, b.reply_input.clone())))
        } else {
            self.home
                .as_ref()
                .and_then(|h| h.selected_id().map(|id| (h.notes.handle(), id, h.reply_input.clone())))
        };
        let Some((handle, note_id, content)) = target else {
            return;
        };
        let identity = self.session.identity();
        let store = Arc::clone(&self.backend.store);
        self.dispatch(Op::Reply, async move {
            ops::reply_to_note(&store, &handle, &note_id, identity.as_ref(), &content).await
        });
    }

    fn delete_selected_note(&mut self) {
        let Some(note_id) = self.home.as_ref().and_then(|h| h.selected_id()) else {
            return;
        };
        let store = Arc::clone(&self.backend.store);
        self.dispatch(Op::DeleteNote, async move {
            ops::delete_note(&store, &note_id).await
        });
    }

    fn submit_message(&mut self) {
        let Some(chat) = self.chat.as_ref() else {
            return;
        };
        let text = chat.input.clone();
        let identity = self.session.identity();
        let store = Arc::clone(&self.backend.store);
        self.dispatch(Op::SendMessage, async move {
            ops::send_message(&store, &text, identity.as_ref())
                .await
                .map(|_| ())
        });
    }
}

/// Run the TUI application with panic-safe terminal restore.
pub async fn run(memory: bool) -> Result<()> {
    let mut config = Config::load()?;
    if memory {
        config.backend = BackendKind::Memory;
    }
    let backend = Backend::connect(&config).await?;
    let session = SessionWatcher::new(backend.auth.clone());

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        default_hook(info);
    }));

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, backend, session).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    backend: Backend,
    session: SessionWatcher,
) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    // Forward session transitions into the event channel so the select
    // loop below only ever borrows the app in one place.
    let mut session_rx = backend.auth.watch_session();
    let session_events = events_tx.clone();
    let forwarder = tokio::spawn(async move {
        while session_rx.changed().await.is_ok() {
            if session_events.send(AppEvent::SessionChanged).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(backend, session, events_tx);
    let mut input = EventStream::new();
    let mut frames = time::interval(Duration::from_millis(FRAME_DURATION_MS));

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, &app))?;
        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key).await;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    forwarder.abort();
                    return Err(err.into());
                }
                None => break,
            },
            event = events_rx.recv() => match event {
                Some(event) => app.handle_event(event).await,
                None => break,
            },
            _ = frames.tick() => {}
        }
    }

    forwarder.abort();
    Ok(())
}
