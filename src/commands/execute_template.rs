//! `stencil execute-template` - render templates from arguments or stdin

use crate::Context;
use crate::template::TemplateRenderer;
use anyhow::{Context as AnyhowContext, Result};
use declarative::TemplateEngine;
use std::io::{self, Read, Write};
use system::{DebugSystem, NullSystem, System};

pub fn run(ctx: &Context, templates: Vec<String>) -> Result<()> {
    let inputs = if templates.is_empty() {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Could not read stdin")?;
        vec![("stdin".to_string(), data)]
    } else {
        named_args(templates)
    };

    let output = if ctx.debug {
        let mut renderer = TemplateRenderer::new(
            ctx.config.data.clone(),
            ctx.config.secret.command.clone(),
            DebugSystem::new(NullSystem),
        );
        render_all(&mut renderer, &inputs)?
    } else {
        render_all(&mut super::renderer(ctx), &inputs)?
    };

    io::stdout()
        .lock()
        .write_all(&output)
        .context("Could not write output")?;
    Ok(())
}

/// Arguments are named `arg1`, `arg2`, ... in error messages
fn named_args(templates: Vec<String>) -> Vec<(String, Vec<u8>)> {
    templates
        .into_iter()
        .enumerate()
        .map(|(i, t)| (format!("arg{}", i + 1), t.into_bytes()))
        .collect()
}

fn render_all<S: System>(
    renderer: &mut TemplateRenderer<S>,
    inputs: &[(String, Vec<u8>)],
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    for (name, data) in inputs {
        output.extend(renderer.execute_template_data(name, data)?);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_all_concatenates() {
        let mut data = BTreeMap::new();
        data.insert("user".to_string(), toml::Value::String("ana".into()));
        let mut renderer = TemplateRenderer::new(data, None, NullSystem);
        let inputs = named_args(vec!["hi {{ .user }}".into(), "!".into()]);
        assert_eq!(render_all(&mut renderer, &inputs).unwrap(), b"hi ana!");
    }

    #[test]
    fn test_error_names_argument() {
        let mut renderer = TemplateRenderer::new(BTreeMap::new(), None, NullSystem);
        let inputs = named_args(vec!["ok".into(), "{{ .missing }}".into()]);
        let err = render_all(&mut renderer, &inputs).unwrap_err();
        assert!(err.to_string().contains("arg2"));
    }
}
