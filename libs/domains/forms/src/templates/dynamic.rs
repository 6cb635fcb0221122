use crate::models::Submission;

/// Replace `{{field}}` placeholders with submitted values.
///
/// `New message from {{name}}` becomes `New message from Daniel`. Lists are
/// joined with `, `; unknown and unterminated placeholders are left as is.
pub fn replace_dynamic(text: &str, submission: &Submission) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };

        let key = &after_open[..close];
        output.push_str(&rest[..open]);
        match submission.value(key.trim()) {
            Some(value) => output.push_str(&value.to_string()),
            None => {
                output.push_str("{{");
                output.push_str(key);
                output.push_str("}}");
            }
        }
        rest = &after_open[close + 2..];
    }

    output.push_str(rest);
    output
}
