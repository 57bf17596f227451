//! Terminal rendering of remotes, components and health.

use mosaic_core::Value;
use mosaic_federation::{Component, Export, RemoteDescriptor};
use mosaic_http::{HealthStatus, RemoteHealth};
use mosaic_store::LoadState;
use nu_ansi_term::{Color, Style};

pub fn remote(descriptor: &RemoteDescriptor) -> String {
    let mut line = format!(
        "{} {} {} {}",
        Style::new().bold().fg(Color::Cyan).paint(&descriptor.name),
        Color::Magenta.paint(&descriptor.scope),
        Color::Yellow.paint(&descriptor.exposed_module),
        Color::DarkGray.paint(descriptor.entry_url.as_str()),
    );
    if let Some(style) = &descriptor.style_url {
        line.push_str(&format!(" {}", Color::DarkGray.paint(format!("(css {style})"))));
    }
    line
}

pub fn value(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Map(_) => serde_json::to_string_pretty(&value.to_json())
            .unwrap_or_else(|_| value.to_string()),
        other => other.to_json().to_string(),
    }
}

pub fn component(component: &Component) -> String {
    match component {
        Export::Value(v) => value(v),
        Export::Namespace(module) => {
            let mut lines = vec![format!("{}", Color::Cyan.paint("namespace"))];
            for name in module.names() {
                let kind = module.get(name).map(Export::kind).unwrap_or("?");
                lines.push(format!("  {} {}", Color::Yellow.paint(name), Color::DarkGray.paint(kind)));
            }
            lines.join("\n")
        }
        other => format!("{}", Color::DarkGray.paint(format!("<{}>", other.kind()))),
    }
}

pub fn load_state(name: &str, state: &LoadState) -> String {
    let status = if state.loading {
        Color::Yellow.paint("loading")
    } else if let Some(error) = &state.error {
        Color::Red.paint(format!("error: {error}"))
    } else if state.loaded {
        Color::Green.paint("loaded")
    } else {
        Color::DarkGray.paint("idle")
    };
    format!("{} {}", Style::new().bold().paint(name), status)
}

pub fn health(health: &RemoteHealth) -> String {
    let status = match &health.status {
        HealthStatus::Up { code, latency_ms } => {
            Color::Green.paint(format!("up ({code}, {latency_ms}ms)"))
        }
        HealthStatus::Down { reason } => Color::Red.paint(format!("down: {reason}")),
    };
    format!(
        "{} {} {}",
        Style::new().bold().fg(Color::Cyan).paint(&health.name),
        status,
        Color::DarkGray.paint(&health.url)
    )
}
