//! Menu model shared by the full-screen and line-based front ends
//!
//! Each screen has a fixed, typed set of options bound to single keys. The
//! [`MenuState`] machine turns key presses into parameter edits and
//! [`MenuEffect`]s; drawing and playback stay with the front end.

use crate::domain::params::{ParamId, ParameterStore};
use crate::domain::stimulus::StimulusKind;
use tracing::debug;

/// Menu screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Main,
    Tone,
    Noise,
}

/// Actions an option can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play(StimulusKind),
}

/// What selecting an option does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    NavigateTo(Screen),
    Invoke(Action),
    /// Kind, default and bounds come from the parameter's [`ParamSpec`]
    EditNumeric(ParamId),
    Quit,
}

/// An option bound to a key on one screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuEntry {
    pub key: char,
    pub option: MenuOption,
}

impl MenuEntry {
    const fn new(key: char, option: MenuOption) -> Self {
        Self { key, option }
    }

    const fn edit(id: ParamId, key: char) -> Self {
        Self::new(key, MenuOption::EditNumeric(id))
    }

    pub fn label(&self) -> &'static str {
        match self.option {
            MenuOption::NavigateTo(Screen::Tone) => "Tones",
            MenuOption::NavigateTo(Screen::Noise) => "Noise",
            MenuOption::NavigateTo(Screen::Main) => "Back",
            MenuOption::Invoke(Action::Play(_)) => "Play",
            MenuOption::EditNumeric(id) => id.spec().label,
            MenuOption::Quit => "Quit",
        }
    }

    /// Current value for numeric options, formatted for display
    pub fn value_text(&self, params: &ParameterStore) -> Option<String> {
        match self.option {
            MenuOption::EditNumeric(id) => Some(id.spec().format_value(params.get(id))),
            _ => None,
        }
    }
}

const MAIN_ENTRIES: [MenuEntry; 3] = [
    MenuEntry::new('t', MenuOption::NavigateTo(Screen::Tone)),
    MenuEntry::new('n', MenuOption::NavigateTo(Screen::Noise)),
    MenuEntry::new('q', MenuOption::Quit),
];

const TONE_ENTRIES: [MenuEntry; 9] = [
    MenuEntry::edit(ParamId::ToneFrequency, 'f'),
    MenuEntry::edit(ParamId::ToneAmplitude, 'a'),
    MenuEntry::edit(ParamId::ToneDuration, 'd'),
    MenuEntry::edit(ParamId::DeviceId, 'i'),
    MenuEntry::edit(ParamId::SampleRate, 's'),
    MenuEntry::edit(ParamId::Channels, 'n'),
    MenuEntry::edit(ParamId::OutputChannel, 'o'),
    MenuEntry::new('p', MenuOption::Invoke(Action::Play(StimulusKind::Tone))),
    MenuEntry::new('b', MenuOption::NavigateTo(Screen::Main)),
];

const NOISE_ENTRIES: [MenuEntry; 11] = [
    MenuEntry::edit(ParamId::NoiseCenter, 'c'),
    MenuEntry::edit(ParamId::NoiseBandwidth, 'w'),
    MenuEntry::edit(ParamId::NoiseRms, 'r'),
    MenuEntry::edit(ParamId::NoiseAttenuation, 'a'),
    MenuEntry::edit(ParamId::NoiseDuration, 'd'),
    MenuEntry::edit(ParamId::DeviceId, 'i'),
    MenuEntry::edit(ParamId::SampleRate, 's'),
    MenuEntry::edit(ParamId::Channels, 'n'),
    MenuEntry::edit(ParamId::OutputChannel, 'o'),
    MenuEntry::new('p', MenuOption::Invoke(Action::Play(StimulusKind::Noise))),
    MenuEntry::new('b', MenuOption::NavigateTo(Screen::Main)),
];

impl Screen {
    pub fn title(self) -> &'static str {
        match self {
            Screen::Main => "Main Menu",
            Screen::Tone => "Tone Calibration",
            Screen::Noise => "Noise Calibration",
        }
    }

    pub fn entries(self) -> &'static [MenuEntry] {
        match self {
            Screen::Main => &MAIN_ENTRIES,
            Screen::Tone => &TONE_ENTRIES,
            Screen::Noise => &NOISE_ENTRIES,
        }
    }

    pub fn entry_for_key(self, key: char) -> Option<(usize, &'static MenuEntry)> {
        self.entries()
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.key == key)
    }
}

/// Key presses understood by the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Enter,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Esc,
}

/// What the front end must do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEffect {
    None,
    Play(StimulusKind),
    CancelPlayback,
    Quit,
}

/// Quit confirmation dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuitDialog {
    pub yes_selected: bool,
}

/// Key-dispatch state of the full-screen menu
#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    screen: Screen,
    selected: usize,
    input: String,
    quit_dialog: Option<QuitDialog>,
    status: String,
    playing: bool,
}

impl Default for MenuState {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Main,
            selected: 0,
            input: String::new(),
            quit_dialog: None,
            status: String::new(),
            playing: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_entry(&self) -> &'static MenuEntry {
        let entries = self.screen.entries();
        &entries[self.selected.min(entries.len() - 1)]
    }

    /// Text typed for the selected numeric option
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn quit_dialog(&self) -> Option<QuitDialog> {
        self.quit_dialog
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Disable editing until [`MenuState::finish_playback`]
    pub fn start_playback(&mut self, status: impl Into<String>) {
        self.playing = true;
        self.status = status.into();
    }

    pub fn finish_playback(&mut self, status: impl Into<String>) {
        self.playing = false;
        self.status = status.into();
    }

    /// Instruction line for the current mode
    pub fn instructions(&self) -> &'static str {
        if self.playing {
            "Playing... press Esc to stop"
        } else if self.quit_dialog.is_some() {
            "y: quit, n/Esc: stay, Left/Right: choose, Enter: confirm"
        } else if matches!(self.selected_entry().option, MenuOption::EditNumeric(_)) {
            "Type a value and press Enter (empty = default); Up/Down to move; q to quit"
        } else {
            "Press an option key; Up/Down to move, Enter to select; q to quit"
        }
    }

    /// Apply one key press
    pub fn handle_key(&mut self, key: KeyInput, params: &mut ParameterStore) -> MenuEffect {
        if self.playing {
            return match key {
                KeyInput::Esc => MenuEffect::CancelPlayback,
                _ => MenuEffect::None,
            };
        }

        if let Some(dialog) = self.quit_dialog {
            return match key {
                KeyInput::Char('y') | KeyInput::Char('Y') => MenuEffect::Quit,
                KeyInput::Char('n') | KeyInput::Char('N') | KeyInput::Esc => {
                    self.quit_dialog = None;
                    MenuEffect::None
                }
                KeyInput::Left | KeyInput::Right => {
                    self.quit_dialog = Some(QuitDialog {
                        yes_selected: !dialog.yes_selected,
                    });
                    MenuEffect::None
                }
                KeyInput::Enter if dialog.yes_selected => MenuEffect::Quit,
                KeyInput::Enter => {
                    self.quit_dialog = None;
                    MenuEffect::None
                }
                _ => MenuEffect::None,
            };
        }

        match key {
            KeyInput::Char(c) if self.accepts_numeric_char(c) => {
                self.input.push(c);
                MenuEffect::None
            }
            KeyInput::Char('q') => {
                self.quit_dialog = Some(QuitDialog::default());
                MenuEffect::None
            }
            KeyInput::Char(c) => match self.screen.entry_for_key(c) {
                Some((index, entry)) => {
                    self.select(index);
                    self.activate(entry.option)
                }
                None => MenuEffect::None,
            },
            KeyInput::Backspace => {
                self.input.pop();
                MenuEffect::None
            }
            KeyInput::Enter => match self.selected_entry().option {
                MenuOption::EditNumeric(id) => {
                    self.commit(id, params);
                    MenuEffect::None
                }
                option => self.activate(option),
            },
            KeyInput::Up => {
                let len = self.screen.entries().len();
                self.select((self.selected + len - 1) % len);
                MenuEffect::None
            }
            KeyInput::Down => {
                let len = self.screen.entries().len();
                self.select((self.selected + 1) % len);
                MenuEffect::None
            }
            KeyInput::Esc => {
                self.input.clear();
                MenuEffect::None
            }
            KeyInput::Left | KeyInput::Right => MenuEffect::None,
        }
    }

    fn accepts_numeric_char(&self, c: char) -> bool {
        (c.is_ascii_digit() || c == '.' || c == '-')
            && matches!(self.selected_entry().option, MenuOption::EditNumeric(_))
    }

    fn select(&mut self, index: usize) {
        if index != self.selected {
            self.input.clear();
        }
        self.selected = index;
    }

    fn activate(&mut self, option: MenuOption) -> MenuEffect {
        match option {
            MenuOption::NavigateTo(screen) => {
                debug!(?screen, "Navigating");
                self.screen = screen;
                self.selected = 0;
                self.input.clear();
                MenuEffect::None
            }
            MenuOption::Invoke(Action::Play(kind)) => MenuEffect::Play(kind),
            MenuOption::EditNumeric(_) => {
                self.input.clear();
                MenuEffect::None
            }
            MenuOption::Quit => {
                self.quit_dialog = Some(QuitDialog::default());
                MenuEffect::None
            }
        }
    }

    fn commit(&mut self, id: ParamId, params: &mut ParameterStore) {
        let status = if self.input.is_empty() {
            params.apply_default(id)
        } else {
            params.apply(id, &self.input)
        };
        self.status = status.message;
        self.input.clear();
    }
}
