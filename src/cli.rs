use clap::Parser;
use std::path::PathBuf;

use crate::source::FormSource;

/// Build an OpenRosa FormList manifest from a set of xForms
#[derive(Parser, Debug, Clone)]
#[command(name = "xform-formlist")]
#[command(about = "Create an OpenRosa FormList XML document from xForm URLs or files")]
#[command(version)]
pub struct Cli {
    /// Forms to include: http(s) URLs, local file paths, or '-' for stdin
    #[arg(required = true, help = "Form URLs, file paths, or '-' for stdin")]
    pub forms: Vec<String>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Download URL template, e.g. https://example.com/forms/${formId}.xml
    #[arg(long = "download-url")]
    pub download_url: Option<String>,

    /// Manifest URL template, used for forms that reference external media
    #[arg(long = "manifest-url")]
    pub manifest_url: Option<String>,

    /// Extra request header for remote forms (NAME:VALUE, repeatable)
    #[arg(short = 'H', long = "header", action = clap::ArgAction::Append)]
    pub headers: Vec<String>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Write the manifest to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Open every FORMS argument as a form source, in argument order.
    pub async fn form_sources(&self) -> std::io::Result<Vec<FormSource>> {
        let mut sources = Vec::with_capacity(self.forms.len());
        for form in &self.forms {
            sources.push(Self::open_form(form).await?);
        }
        Ok(sources)
    }

    async fn open_form(form: &str) -> std::io::Result<FormSource> {
        if form == "-" {
            return Ok(FormSource::stdin());
        }
        if FormSource::is_remote_url(form) {
            return Ok(FormSource::RemoteUrl(form.to_string()));
        }
        FormSource::open_file(form).await
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }
}
