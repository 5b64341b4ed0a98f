//! Section state machine for `.conf` files.
//!
//! The parser is a single pass over the input. It tracks the current section
//! and a "multi-line script" sub-state entered by a blank `script =` key.
//! Malformed lines never fail the parse; they are skipped and traced at
//! `debug` level.
//!
//! While reading a multi-line script each line first goes through
//! [`ends_multiline_script`]. A line that ends the script body is then
//! handled by the normal path, so no line is dropped.
//!
//! # Examples
//!
//! ```
//! use openwrt_connect_core::{CommandKind, parse};
//!
//! let config = parse(
//!     "[general]\n\
//!      ssh_user = admin\n\
//!      [command.setup]\n\
//!      cmd = opkg update\n",
//! );
//! assert_eq!(config.remote_user, "admin");
//! assert_eq!(
//!     config.find_command("setup").unwrap().kind,
//!     CommandKind::DirectCommand { command_line: "opkg update".into() },
//! );
//! ```

mod lines;

use tracing::{debug, warn};

use crate::types::{CommandDef, CommandKind, Config, ContentKey};

use lines::{
    RawLine, is_file_reference, is_indented, raw_lines, section_name, split_key_value, trim_line,
};

const GENERAL_SECTION: &str = "general";
const COMMAND_SECTION_PREFIX: &str = "command.";

/// Parses config text into a [`Config`].
///
/// Script file references are left unresolved; see
/// [`resolve_script_files`](crate::resolve_script_files).
pub fn parse(input: &str) -> Config {
    let mut parser = ConfigParser::new();
    for line in raw_lines(input) {
        parser.feed(line);
    }
    parser.finish()
}

/// Returns `true` when a line read in multi-line script mode ends the body.
///
/// Any line whose trimmed text starts with `[` ends the body, indented or
/// not. A `key = value` line ends it only when it is not indented.
pub fn ends_multiline_script(raw: &str) -> bool {
    let trimmed = trim_line(raw);
    if trimmed.starts_with('[') {
        return true;
    }
    if is_indented(raw) || trimmed.starts_with('#') {
        return false;
    }
    split_key_value(trimmed).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before the first header.
    None,
    General,
    /// `[command.<name>]`, holding the index of the command.
    Command(usize),
    /// Any other header, including `[command.]`.
    Other,
}

#[derive(Debug, Default)]
struct ScriptDraft {
    body: String,
    file: Option<String>,
}

/// Raw content keys of one command section, before the kind is settled.
#[derive(Debug, Default)]
struct CommandDraft {
    kind: Option<ContentKey>,
    script: Option<ScriptDraft>,
    url: Option<String>,
    cmd: Option<String>,
    shadowed: Vec<ContentKey>,
}

impl CommandDraft {
    /// Records a content key. The first one decides the kind.
    fn claim(&mut self, key: ContentKey) {
        match self.kind {
            None => self.kind = Some(key),
            Some(current) if current != key && !self.shadowed.contains(&key) => {
                self.shadowed.push(key);
            }
            Some(_) => {}
        }
    }

    fn into_kind(self) -> CommandKind {
        match self.kind {
            None => CommandKind::InteractiveSession,
            Some(ContentKey::Script) => {
                let script = self.script.unwrap_or_default();
                CommandKind::Script {
                    body: script.body,
                    file: script.file,
                }
            }
            Some(ContentKey::Url) => CommandKind::RemoteFetch {
                url: self.url.unwrap_or_default(),
            },
            Some(ContentKey::Cmd) => CommandKind::DirectCommand {
                command_line: self.cmd.unwrap_or_default(),
            },
        }
    }
}

/// Per-call parser state.
#[derive(Debug)]
struct ConfigParser {
    config: Config,
    drafts: Vec<CommandDraft>,
    section: Section,
    reading_script: bool,
}

impl ConfigParser {
    fn new() -> Self {
        Self {
            config: Config::default(),
            drafts: Vec::new(),
            section: Section::None,
            reading_script: false,
        }
    }

    fn feed(&mut self, line: RawLine<'_>) {
        if self.reading_script {
            if ends_multiline_script(line.text) {
                self.reading_script = false;
            } else {
                self.append_script_line(line);
                return;
            }
        }
        self.process_line(line);
    }

    fn append_script_line(&mut self, line: RawLine<'_>) {
        if line.is_blank_or_comment() {
            return;
        }
        let Section::Command(idx) = self.section else {
            return;
        };
        let script = self.drafts[idx].script.get_or_insert_with(ScriptDraft::default);
        script.body.push_str(line.without_content_indent());
    }

    fn process_line(&mut self, line: RawLine<'_>) {
        let trimmed = line.trimmed();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        if trimmed.starts_with('[') {
            match section_name(trimmed) {
                Some(name) => self.enter_section(name),
                None => debug!(line = line.number, "skipping unterminated section header"),
            }
            return;
        }

        let Some((key, value)) = split_key_value(trimmed) else {
            debug!(line = line.number, "skipping line without key/value separator");
            return;
        };

        match self.section {
            Section::General => self.apply_general(key, value),
            Section::Command(idx) => self.apply_command(idx, key, value),
            Section::None | Section::Other => {}
        }
    }

    fn enter_section(&mut self, name: &str) {
        self.section = match name.strip_prefix(COMMAND_SECTION_PREFIX) {
            Some(command) if !command.is_empty() => {
                self.config.commands.push(CommandDef::new(command));
                self.drafts.push(CommandDraft::default());
                Section::Command(self.config.commands.len() - 1)
            }
            _ if name == GENERAL_SECTION => Section::General,
            _ => Section::Other,
        };
    }

    fn apply_general(&mut self, key: &str, value: &str) {
        let field = match key {
            "product_name" => &mut self.config.product_name,
            "default_ip" => &mut self.config.default_address,
            "ssh_user" => &mut self.config.remote_user,
            "ssh_key_prefix" => &mut self.config.key_prefix,
            _ => return,
        };
        *field = value.to_string();
    }

    fn apply_command(&mut self, idx: usize, key: &str, value: &str) {
        if key == "label" {
            self.config.commands[idx].label = Some(value.to_string());
            return;
        }
        let Some(content) = ContentKey::from_key(key) else {
            return;
        };

        let draft = &mut self.drafts[idx];
        match content {
            ContentKey::Script => {
                let script = if value.is_empty() {
                    self.reading_script = true;
                    ScriptDraft::default()
                } else if is_file_reference(value) {
                    ScriptDraft {
                        body: String::new(),
                        file: Some(value.to_string()),
                    }
                } else {
                    ScriptDraft {
                        body: value.to_string(),
                        file: None,
                    }
                };
                draft.script = Some(script);
            }
            ContentKey::Url => draft.url = Some(value.to_string()),
            ContentKey::Cmd => draft.cmd = Some(value.to_string()),
        }
        draft.claim(content);
    }

    fn finish(mut self) -> Config {
        for (command, draft) in self.config.commands.iter_mut().zip(self.drafts) {
            if !draft.shadowed.is_empty() {
                warn!(
                    command = %command.name,
                    kept = ?draft.kind,
                    ignored = ?draft.shadowed,
                    "command defines more than one of script/url/cmd; the first one wins"
                );
            }
            command.shadowed = draft.shadowed.clone();
            command.kind = draft.into_kind();
        }
        self.config
    }
}
