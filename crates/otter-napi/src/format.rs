use std::borrow::Cow;
use std::fmt;

/// Render a message for the formatted throw helpers.
///
/// Static messages without arguments are borrowed as is.
pub fn format_message(args: fmt::Arguments<'_>) -> Cow<'static, str> {
    match args.as_str() {
        Some(message) => Cow::Borrowed(message),
        None => Cow::Owned(fmt::format(args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_message_is_borrowed() {
        assert!(matches!(
            format_message(format_args!("plain")),
            Cow::Borrowed("plain")
        ));
    }

    #[test]
    fn test_arguments_are_substituted() {
        let name = "buffer";
        let message = format_message(format_args!("{name} has {} of {} bytes", 3, 8));
        assert_eq!(message, "buffer has 3 of 8 bytes");
    }
}
