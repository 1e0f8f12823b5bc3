//! Directory continuity for one-shot execution.
//!
//! Every exec channel starts a new remote shell, so the tracked directory has
//! to be re-established on each call:
//!
//! - `cd <tracked> && <command>` for ordinary commands
//! - `cd <tracked> && cd <target> && pwd` for a bare `cd`, whose stdout then
//!   becomes the new tracked directory

/// Characters that never need quoting in a POSIX shell word.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ',' | ':' | '@' | '%' | '+' | '=')
}

/// Quote a word for POSIX `sh`.
pub(crate) fn shell_quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Quote a directory while keeping a leading `~` expandable.
pub(crate) fn quote_directory(dir: &str) -> String {
    if dir == "~" {
        return dir.to_string();
    }
    match dir.strip_prefix("~/") {
        Some("") => "~/".to_string(),
        Some(rest) => format!("~/{}", shell_quote(rest)),
        None => shell_quote(dir),
    }
}

/// Whether `command` is a plain `cd` (no pipes, lists or redirections).
pub(crate) fn is_bare_cd(command: &str) -> bool {
    let trimmed = command.trim();
    let is_cd = trimmed == "cd"
        || trimmed
            .strip_prefix("cd")
            .is_some_and(|rest| rest.starts_with(char::is_whitespace));
    is_cd && !trimmed.contains(['&', ';', '|', '\n', '>', '<'])
}

/// One-shot command line for `command` run from `tracked_dir`.
pub(crate) fn compose_one_shot(tracked_dir: &str, command: &str) -> String {
    let dir = quote_directory(tracked_dir);
    if is_bare_cd(command) {
        format!("cd {} && {} && pwd", dir, command.trim())
    } else {
        format!("cd {} && {}", dir, command)
    }
}

/// Last non-empty line of `pwd` output.
pub(crate) fn parse_pwd(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod quoting {
        use super::*;

        #[test]
        fn test_safe_words_unquoted() {
            assert_eq!(shell_quote("/var/log"), "/var/log");
            assert_eq!(shell_quote("a-b_c.d"), "a-b_c.d");
        }

        #[test]
        fn test_spaces_and_quotes() {
            assert_eq!(shell_quote("/tmp/my dir"), "'/tmp/my dir'");
            assert_eq!(shell_quote("it's"), r"'it'\''s'");
            assert_eq!(shell_quote(""), "''");
        }

        #[test]
        fn test_tilde_stays_expandable() {
            assert_eq!(quote_directory("~"), "~");
            assert_eq!(quote_directory("~/"), "~/");
            assert_eq!(quote_directory("~/my dir"), "~/'my dir'");
            assert_eq!(quote_directory("/home/me"), "/home/me");
        }
    }

    mod cd_detection {
        use super::*;

        #[test]
        fn test_bare_cd() {
            assert!(is_bare_cd("cd /tmp"));
            assert!(is_bare_cd("  cd   ..  "));
            assert!(is_bare_cd("cd"));
            assert!(is_bare_cd("cd\t/var"));
            assert!(is_bare_cd("cd $HOME"));
        }

        #[test]
        fn test_not_bare_cd() {
            assert!(!is_bare_cd("cd /tmp && ls"));
            assert!(!is_bare_cd("cd /tmp; ls"));
            assert!(!is_bare_cd("cdrecord -v"));
            assert!(!is_bare_cd("ls cd"));
            assert!(!is_bare_cd("cd /tmp > /dev/null"));
        }
    }

    mod composition {
        use super::*;

        #[test]
        fn test_plain_command() {
            assert_eq!(compose_one_shot("~", "ls -la"), "cd ~ && ls -la");
            assert_eq!(
                compose_one_shot("/srv/app data", "make"),
                "cd '/srv/app data' && make"
            );
        }

        #[test]
        fn test_cd_command_appends_pwd() {
            assert_eq!(
                compose_one_shot("/home/me", "cd /tmp"),
                "cd /home/me && cd /tmp && pwd"
            );
        }

        #[test]
        fn test_parse_pwd() {
            assert_eq!(parse_pwd("/tmp\n"), Some("/tmp".to_string()));
            assert_eq!(parse_pwd("noise\n/var/log\n\n"), Some("/var/log".to_string()));
            assert_eq!(parse_pwd("  \n"), None);
        }
    }
}
