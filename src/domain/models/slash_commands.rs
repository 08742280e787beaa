#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
    remainder: String,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let text = text.trim();
        let (prefix, remainder) = match text.split_once(char::is_whitespace) {
            Some((prefix, remainder)) => (prefix, remainder.trim_start()),
            None => (text, ""),
        };
        if prefix.is_empty() {
            return None;
        }

        let cmd = SlashCommand {
            command: prefix.to_string(),
            args: remainder
                .split_whitespace()
                .map(|e| return e.to_string())
                .collect(),
            remainder: remainder.to_string(),
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_new_session()
            || cmd.is_list_sessions()
            || cmd.is_open_session()
            || cmd.is_rename_session()
            || cmd.is_delete_session()
            || cmd.is_clear_sessions()
            || cmd.is_attach()
            || cmd.is_detach()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Everything typed after the command, inner whitespace untouched.
    pub fn rest(&self) -> String {
        return self.remainder.to_string();
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_new_session(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_list_sessions(&self) -> bool {
        return ["/ls", "/sessions"].contains(&self.command.as_str());
    }

    pub fn is_open_session(&self) -> bool {
        return ["/o", "/open"].contains(&self.command.as_str());
    }

    pub fn is_rename_session(&self) -> bool {
        return ["/r", "/rename"].contains(&self.command.as_str());
    }

    pub fn is_delete_session(&self) -> bool {
        return ["/d", "/delete"].contains(&self.command.as_str());
    }

    pub fn is_clear_sessions(&self) -> bool {
        return ["/clear"].contains(&self.command.as_str());
    }

    pub fn is_attach(&self) -> bool {
        return ["/a", "/attach"].contains(&self.command.as_str());
    }

    pub fn is_detach(&self) -> bool {
        return ["/detach"].contains(&self.command.as_str());
    }
}
