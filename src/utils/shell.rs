//! Shell quoting for displaying tool invocations.
//!
//! Tools are spawned with an argument vector, never through a shell; these
//! helpers only render a copy-pasteable command line for logs and dry-runs.

const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~',
];

/// Single-quotes `arg` when a POSIX shell would otherwise split or expand it.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        "''".to_string()
    } else if arg.contains(SHELL_META) {
        // 'it'\''s': close, escaped quote, reopen
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

/// Render `program args...` as a single display line.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_flags_are_left_alone() {
        assert_eq!(quote_arg("version"), "version");
        assert_eq!(quote_arg("--output=json"), "--output=json");
        assert_eq!(quote_arg("registry.example.com/app:v1"), "registry.example.com/app:v1");
    }

    #[test]
    fn metacharacters_are_single_quoted() {
        assert_eq!(quote_arg("hello world"), "'hello world'");
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
        assert_eq!(quote_arg("~/reports"), "'~/reports'");
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn command_line_quotes_only_what_needs_it() {
        let args = vec![
            "build".to_string(),
            "--build-arg".to_string(),
            "GREETING=hello world".to_string(),
            ".".to_string(),
        ];
        assert_eq!(
            command_line("docker", &args),
            "docker build --build-arg 'GREETING=hello world' ."
        );
    }

    #[test]
    fn command_line_without_args() {
        assert_eq!(command_line("gatecheck", &[]), "gatecheck");
    }
}
