#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: char,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Quit,
    Refresh,
    CheckEmails,
    Canvas,
    CloseModal,
    ScrollDown,
    ScrollUp,
}

pub const DASHBOARD_BINDINGS: [HotkeyBinding; 4] = [
    HotkeyBinding {
        key: 'q',
        action: "quit",
    },
    HotkeyBinding {
        key: 'r',
        action: "refresh",
    },
    HotkeyBinding {
        key: 'e',
        action: "check emails",
    },
    HotkeyBinding {
        key: 'c',
        action: "canvas",
    },
];

pub const COMMAND_LOG_BINDINGS: [HotkeyBinding; 3] = [
    HotkeyBinding {
        key: 'b',
        action: "close",
    },
    HotkeyBinding {
        key: 'j',
        action: "scroll down",
    },
    HotkeyBinding {
        key: 'k',
        action: "scroll up",
    },
];

pub fn dashboard_controls_legend() -> String {
    format_bindings("Keys: ", &DASHBOARD_BINDINGS)
}

pub fn command_log_controls_legend() -> String {
    format!("{}  esc close", format_bindings("Keys: ", &COMMAND_LOG_BINDINGS))
}

/// `q` still quits while the command log is open.
pub fn action_for_key(key: char, modal_open: bool) -> Option<HotkeyAction> {
    match key {
        'q' => Some(HotkeyAction::Quit),
        'b' if modal_open => Some(HotkeyAction::CloseModal),
        'j' if modal_open => Some(HotkeyAction::ScrollDown),
        'k' if modal_open => Some(HotkeyAction::ScrollUp),
        'r' if !modal_open => Some(HotkeyAction::Refresh),
        'e' if !modal_open => Some(HotkeyAction::CheckEmails),
        'c' if !modal_open => Some(HotkeyAction::Canvas),
        _ => None,
    }
}

fn format_bindings(prefix: &str, bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{} {}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("{prefix}{}", parts.join("  "))
}
