//! Template engine based on MiniJinja

use chartgen_core::{ChartFile, ChartKind, LoadedChart, ReleaseInfo, TemplateContext, Values};
use minijinja::Environment;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;
use crate::hooks::{self, HookManifest};

/// Result of rendering a chart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderResult {
    /// Non-hook documents, each as `---\n# Source: <path>\n<doc>\n`
    pub manifest: String,

    /// Hook documents in render order
    pub hooks: Vec<HookManifest>,
}

/// Template engine builder
#[derive(Debug, Default)]
pub struct EngineBuilder {
    strict: Option<bool>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force strict mode on or off for every chart, ignoring `engine.strict`
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            strict: self.strict,
        }
    }
}

/// The template engine
///
/// Renders client-side only: hooks are rendered, classified and returned,
/// CRDs from `crds/` are included verbatim ahead of templated resources.
#[derive(Debug, Default)]
pub struct Engine {
    strict: Option<bool>,
}

/// One rendered YAML document and where it came from
struct Document {
    source: String,
    content: String,
}

impl Engine {
    /// Engine honoring each chart's `engine.strict`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn create_environment(&self, strict: bool) -> Environment<'static> {
        let mut env = Environment::new();

        env.set_undefined_behavior(if strict {
            minijinja::UndefinedBehavior::Strict
        } else {
            minijinja::UndefinedBehavior::Lenient
        });
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("required", filters::required);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("sha256", filters::sha256);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("get", functions::get);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);
        env.add_function("tostring", functions::tostring);
        env.add_function("toint", functions::toint);

        env
    }

    /// Render a chart and its enabled subcharts against final values
    pub fn render(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderResult> {
        let mut crds = Vec::new();
        let mut documents = Vec::new();
        self.render_chart(
            chart,
            values,
            release,
            &chart.metadata.name,
            &mut crds,
            &mut documents,
        )?;

        let mut result = RenderResult::default();
        for doc in crds.into_iter().chain(documents) {
            let parsed: serde_yaml::Value =
                serde_yaml::from_str(&doc.content).map_err(|e| EngineError::InvalidManifest {
                    source_path: doc.source.clone(),
                    message: e.to_string(),
                })?;

            match hooks::classify(&parsed, &doc.source, &doc.content) {
                Some(hook) => result.hooks.push(hook),
                None => {
                    result.manifest.push_str("---\n# Source: ");
                    result.manifest.push_str(&doc.source);
                    result.manifest.push('\n');
                    result.manifest.push_str(&doc.content);
                    result.manifest.push('\n');
                }
            }
        }

        tracing::debug!(
            chart = %chart.metadata.name,
            hooks = result.hooks.len(),
            "render finished"
        );
        Ok(result)
    }

    fn render_chart(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
        prefix: &str,
        crds: &mut Vec<Document>,
        documents: &mut Vec<Document>,
    ) -> Result<()> {
        for file in &chart.crds {
            let source = format!("{prefix}/{}", file.path);
            crds.extend(split_documents(&file.content).map(|content| Document {
                source: source.clone(),
                content,
            }));
        }

        if chart.metadata.kind != ChartKind::Library {
            let strict = self.strict.unwrap_or(chart.metadata.engine.strict);
            let mut env = self.create_environment(strict);

            for file in &chart.templates {
                env.add_template_owned(template_name(file).to_string(), file.content.clone())
                    .map_err(|e| template_error(&e, chart, file))?;
            }

            let context = TemplateContext::new(values, release, &chart.metadata).to_json();

            for file in chart.templates.iter().filter(|f| is_rendered(f)) {
                let rendered = env
                    .get_template(template_name(file))
                    .and_then(|tmpl| tmpl.render(&context))
                    .map_err(|e| template_error(&e, chart, file))?;

                let source = format!("{prefix}/{}", file.path);
                documents.extend(split_documents(&rendered).map(|content| Document {
                    source: source.clone(),
                    content,
                }));
            }
        }

        for sub in &chart.subcharts {
            let dependency = chart
                .metadata
                .dependencies
                .iter()
                .find(|d| d.name == sub.metadata.name);

            if let Some(dep) = dependency {
                if !dep.is_enabled(values) {
                    tracing::debug!(subchart = %dep.effective_name(), "subchart disabled");
                    continue;
                }
            }

            let scope = dependency.map_or(sub.metadata.name.as_str(), |d| d.effective_name());
            let sub_values = Values::for_subchart(&sub.values, values, scope);
            let sub_prefix = format!("{prefix}/charts/{scope}");
            self.render_chart(sub, &sub_values, release, &sub_prefix, crds, documents)?;
        }

        Ok(())
    }
}

/// Name a template is registered under: its path below `templates/`
fn template_name(file: &ChartFile) -> &str {
    file.path.strip_prefix("templates/").unwrap_or(&file.path)
}

/// Helpers (`_*`) and `NOTES.txt` are loadable but not rendered
fn is_rendered(file: &ChartFile) -> bool {
    let name = file.file_name();
    !name.starts_with('_') && !name.eq_ignore_ascii_case("NOTES.txt")
}

fn template_error(err: &minijinja::Error, chart: &LoadedChart, file: &ChartFile) -> EngineError {
    // Errors raised inside an included helper point at that helper
    let failing = err
        .name()
        .and_then(|name| chart.templates.iter().find(|t| template_name(t) == name))
        .unwrap_or(file);
    EngineError::Template(TemplateError::from_minijinja(
        err,
        &failing.path,
        &failing.content,
    ))
}

/// Split rendered text on `---` separator lines, dropping documents that
/// hold only whitespace or comments
fn split_documents(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut docs = vec![String::new()];
    for line in text.lines() {
        let marker = line.trim_end();
        if marker == "---" || marker.starts_with("--- ") {
            docs.push(String::new());
            continue;
        }
        if let Some(current) = docs.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }

    docs.into_iter()
        .map(|doc| strip_blank_lines(&doc))
        .filter(|doc| {
            doc.lines().any(|l| {
                let l = l.trim();
                !l.is_empty() && !l.starts_with('#')
            })
        })
}

/// Drop blank lines at either end, leaving every other line untouched
fn strip_blank_lines(doc: &str) -> String {
    let lines: Vec<&str> = doc.lines().collect();
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}
