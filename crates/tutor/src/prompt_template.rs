use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

/// Fixed instruction prepended to every chat request
pub const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

pub const PRACTICE_GENERATE: &str = include_str!("prompts/practice_generate.md");
pub const PRACTICE_CHECK: &str = include_str!("prompts/practice_check.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}
