//! Email template rendering engine.
//!
//! Handlebars templates receive the submission as context. The `is_list`
//! helper lets a template choose between list and single-value layouts:
//!
//! ```handlebars
//! {{#if (is_list value)}}{{#each value}}{{this}}<br>{{/each}}{{else}}{{value}}{{/if}}
//! ```
//!
//! Rendered HTML is passed through CSS inlining so styles survive clients
//! that strip `<style>` blocks.

mod dynamic;

pub use dynamic::replace_dynamic;

use crate::error::{FormError, FormResult};
use crate::form::Email;
use crate::models::{FieldValue, Submission};
use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_TEMPLATE_NAME: &str = "default";

handlebars_helper!(is_list: |value: Json| value.is_array());

/// Serialized view of a submission exposed to templates.
#[derive(Debug, Serialize)]
struct TemplateContext<'a> {
    form: FormContext<'a>,
    order: &'a [String],
    /// Submitted values minus the form's ignored fields.
    values: BTreeMap<&'a str, &'a FieldValue>,
    fields: Vec<FieldContext<'a>>,
    attachments: Vec<AttachmentContext<'a>>,
}

#[derive(Debug, Serialize)]
struct FormContext<'a> {
    id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct FieldContext<'a> {
    name: &'a str,
    value: &'a FieldValue,
}

#[derive(Debug, Serialize)]
struct AttachmentContext<'a> {
    field: &'a str,
    filename: &'a str,
    mime_type: &'a str,
    size: usize,
}

impl<'a> From<&'a Submission> for TemplateContext<'a> {
    fn from(submission: &'a Submission) -> Self {
        let form = submission.form();
        Self {
            form: FormContext {
                id: &form.id,
                name: form.display_name(),
            },
            order: submission.order(),
            values: submission
                .values()
                .iter()
                .filter(|(name, _)| !form.is_ignored(name))
                .map(|(name, value)| (name.as_str(), value))
                .collect(),
            fields: submission
                .fields()
                .map(|(name, value)| FieldContext { name, value })
                .collect(),
            attachments: submission
                .attachments()
                .iter()
                .map(|attachment| AttachmentContext {
                    field: &attachment.field,
                    filename: &attachment.filename,
                    mime_type: &attachment.mime_type,
                    size: attachment.data.len(),
                })
                .collect(),
        }
    }
}

/// Template engine for rendering submission emails.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with the default template registered.
    pub fn new() -> FormResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper("is_list", Box::new(is_list));
        handlebars
            .register_template_string(DEFAULT_TEMPLATE_NAME, DEFAULT_HTML_TEMPLATE)
            .map_err(|e| {
                FormError::TemplateRender(format!("Failed to register default template: {}", e))
            })?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    /// Render the email body for a submission and inline its CSS.
    pub fn render(&self, email: &Email, submission: &Submission) -> FormResult<String> {
        let context = TemplateContext::from(submission);

        let html = match email.custom_template() {
            Some(template) => {
                debug!(email = %email.id, "Rendering custom template");
                self.handlebars.render_template(template, &context)?
            }
            None => {
                debug!(email = %email.id, "Rendering default template");
                self.handlebars.render(DEFAULT_TEMPLATE_NAME, &context)?
            }
        };

        Ok(css_inline::inline(&html)?)
    }
}

const DEFAULT_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<style>
body {
    background: #f5f5f5;
    font-family: sans-serif;
}
#wrapper {
    background: #fff;
    padding: 30px 20px;
    border: 1px solid #ccc;
    border-radius: 4px;
    margin: 20px auto 10px;
}
.content {
    width: 100%;
    max-width: 800px;
    margin: 0 auto 0;
    box-sizing: border-box;
}
h1 {
    font-size: 2rem;
    color: #212121;
    font-weight: bold;
    margin: 0 0 10px;
}
table {
    border-collapse: collapse;
}
th, td {
    vertical-align: top;
    padding: 10px 10px;
    border-top: 1px solid #ddd;
    text-align: left;
    color: #404040;
    font-size: 1.2rem;
    font-weight: 400;
}
th {
    font-weight: bold;
}
.attachments {
    color: #404040;
    margin: 20px 0 0;
}
</style>
</head>
<body>
<div id="wrapper" class="content">
<h1>New {{form.name}} Submission</h1>
<table>
<tbody>
{{#each fields}}
<tr>
<th>{{name}}</th>
<td>{{#if (is_list value)}}{{#each value}}{{this}}{{#unless @last}}<br>{{/unless}}{{/each}}{{else}}{{value}}{{/if}}</td>
</tr>
{{/each}}
</tbody>
</table>
{{#if attachments}}
<p class="attachments">Attachments: {{#each attachments}}{{filename}}{{#unless @last}}, {{/unless}}{{/each}}</p>
{{/if}}
</div>
</body>
</html>
"#;
