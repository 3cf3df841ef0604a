use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use streamchat_core::{
    Config, RequestCoordinator, RequestPayload, Snapshot, StreamState, SubmitError, Submission,
    AVAILABLE_MODELS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Focusable parts of the screen, in Tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DeveloperMessage,
    UserMessage,
    Model,
    ApiKey,
    Send,
    Response,
}

impl Field {
    const ORDER: [Field; 6] = [
        Field::DeveloperMessage,
        Field::UserMessage,
        Field::Model,
        Field::ApiKey,
        Field::Send,
        Field::Response,
    ];

    pub fn next(self) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    /// Fields that take typed text.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Field::DeveloperMessage | Field::UserMessage | Field::ApiKey
        )
    }

    /// Message fields accept newlines.
    pub fn is_multiline(self) -> bool {
        matches!(self, Field::DeveloperMessage | Field::UserMessage)
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::DeveloperMessage => "Developer Message",
            Field::UserMessage => "User Message",
            Field::Model => "Model",
            Field::ApiKey => "OpenAI API Key",
            Field::Send => "Send",
            Field::Response => "Response",
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Editable text with a character-based cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// (line, column) of the cursor, both counted in characters.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.value.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0);
        (line, col)
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: Field,

    // Form state (the request is built from these on submit)
    pub developer_message: TextInput,
    pub user_message: TextInput,
    pub api_key: TextInput,
    pub selected_model: String,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Request state
    pub coordinator: RequestCoordinator,
    pub submission: Option<Submission>,
    pub snapshot: Snapshot,
    pub status_message: Option<String>,

    // Response pane
    pub response_scroll: u16,
    pub response_height: u16, // Inner height, updated during render
    pub response_width: u16,  // Inner width, for wrap calculations
    pub follow_output: bool,
    pub response_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config, coordinator: RequestCoordinator) -> Self {
        let developer_message = config.developer_message.clone().unwrap_or_default();

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: Field::DeveloperMessage,

            developer_message: TextInput::new(developer_message),
            user_message: TextInput::default(),
            api_key: TextInput::default(),
            selected_model: config.model().to_string(),

            show_model_picker: false,
            available_models: AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect(),
            model_picker_state: ListState::default(),

            snapshot: coordinator.snapshot(),
            coordinator,
            submission: None,
            status_message: None,

            response_scroll: 0,
            response_height: 0,
            response_width: 0,
            follow_output: true,
            response_area: None,

            animation_frame: 0,
        }
    }

    /// Payload from the current form values.
    pub fn payload(&self) -> RequestPayload {
        RequestPayload::new(
            self.developer_message.value.clone(),
            self.user_message.value.clone(),
            self.selected_model.clone(),
            self.api_key.value.clone(),
        )
    }

    pub fn is_busy(&self) -> bool {
        self.snapshot.state.is_in_flight()
    }

    /// Validate the form and start a request. Needs a tokio runtime.
    pub fn submit(&mut self) {
        let payload = self.payload();
        let missing = payload.missing_fields();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.display_name()).collect();
            self.status_message = Some(format!("Required: {}", names.join(", ")));
            if let Some(first) = missing.first() {
                self.focus = match first {
                    streamchat_core::RequiredField::DeveloperMessage => Field::DeveloperMessage,
                    streamchat_core::RequiredField::UserMessage => Field::UserMessage,
                    streamchat_core::RequiredField::ApiKey => Field::ApiKey,
                };
            }
            return;
        }

        match self.coordinator.submit(payload) {
            Ok(submission) => {
                self.submission = Some(submission);
                self.status_message = None;
                self.snapshot = self.coordinator.snapshot();
                self.follow_output = true;
                self.response_scroll = 0;
            }
            Err(SubmitError::Busy) => {
                self.status_message = Some(SubmitError::Busy.to_string());
            }
        }
    }

    /// Abort the in-flight request, keeping whatever already arrived.
    pub fn cancel(&mut self) {
        match self.submission.take() {
            Some(submission) => submission.cancel(),
            None => {
                self.coordinator.cancel();
            }
        }
        self.snapshot = self.coordinator.snapshot();
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        // Forwarded snapshots can lag behind one taken directly at submit time.
        if snapshot.cycle < self.snapshot.cycle {
            return;
        }
        self.snapshot = snapshot;

        let cycle = self.snapshot.cycle;
        if self.snapshot.state.is_terminal()
            && self.submission.as_ref().is_some_and(|s| s.cycle() == cycle)
        {
            self.submission = None;
        }

        if self.follow_output {
            self.scroll_response_to_bottom();
        }
    }

    pub fn focused_input_mut(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            Field::DeveloperMessage => Some(&mut self.developer_message),
            Field::UserMessage => Some(&mut self.user_message),
            Field::ApiKey => Some(&mut self.api_key),
            _ => None,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Total wrapped lines the response pane needs.
    pub fn response_line_count(&self) -> u16 {
        // Use actual pane width for wrap calculation, default to 50 if not set
        let wrap_width = if self.response_width > 0 {
            self.response_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for line in self.snapshot.output.split('\n') {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count = line.chars().count();
            if char_count == 0 {
                total_lines = total_lines.saturating_add(1);
            } else {
                total_lines = total_lines.saturating_add(((char_count - 1) / wrap_width + 1) as u16);
            }
        }

        // Error line below preserved partial output
        if self.snapshot.state.failure().is_some() && !self.output_is_error() {
            total_lines = total_lines.saturating_add(2);
        }

        total_lines
    }

    /// The buffer was replaced by the error text (transport failure).
    pub fn output_is_error(&self) -> bool {
        matches!(
            &self.snapshot.state,
            StreamState::Failed(f) if f.kind == streamchat_core::FailureKind::Transport
        )
    }

    fn max_response_scroll(&self) -> u16 {
        let visible_height = if self.response_height > 0 {
            self.response_height
        } else {
            10
        };
        self.response_line_count().saturating_sub(visible_height)
    }

    /// Keep the newest output visible, like auto-scrolling the response box.
    pub fn scroll_response_to_bottom(&mut self) {
        self.response_scroll = self.max_response_scroll();
    }

    pub fn scroll_response_down(&mut self, lines: u16) {
        let max_scroll = self.max_response_scroll();
        self.response_scroll = self.response_scroll.saturating_add(lines).min(max_scroll);
        self.follow_output = self.response_scroll >= max_scroll;
    }

    pub fn scroll_response_up(&mut self, lines: u16) {
        self.response_scroll = self.response_scroll.saturating_sub(lines);
        self.follow_output = self.response_scroll >= self.max_response_scroll();
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        let current = self
            .available_models
            .iter()
            .position(|m| *m == self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                // Save to config
                if let Err(err) = Config::save_default_model(&self.selected_model) {
                    tracing::warn!("could not save default model: {}", err);
                }
            }
        }
    }
}
