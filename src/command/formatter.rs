//! Renders an argv as a single log-safe line.

const PASSWORD_PREFIX: &str = "--password";
const MASKED_PASSWORD: &str = "--password=***";

/// Join `args` with spaces, masking the password and quoting values with spaces.
///
/// An argument containing a space keeps its `key=` prefix unquoted and wraps
/// the rest in double quotes. The result is for display only; it is never
/// parsed back into arguments.
pub fn format_command<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| format_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_arg(arg: &str) -> String {
    if arg.starts_with(PASSWORD_PREFIX) {
        return MASKED_PASSWORD.to_string();
    }
    if arg.contains(' ') {
        let split = arg.find('=').map_or(0, |i| i + 1);
        let (key, value) = arg.split_at(split);
        return format!("{}\"{}\"", key, value);
    }
    arg.to_string()
}
