//! Reporter command line construction.

use crate::config::Settings;
use crate::heartbeat::Heartbeat;
use std::path::PathBuf;

/// Builds reporter argument vectors for one installed binary.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary_path: PathBuf,
    plugin_identity: String,
}

impl CommandBuilder {
    pub fn new(binary_path: impl Into<PathBuf>, plugin_identity: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            plugin_identity: plugin_identity.into(),
        }
    }

    /// Argument vector (binary first) reporting `primary`.
    ///
    /// The extras themselves travel on stdin; here they only toggle
    /// `--extra-heartbeats`.
    pub fn build(
        &self,
        primary: &Heartbeat,
        api_key: &str,
        extras: &[Heartbeat],
        settings: &Settings,
    ) -> Vec<String> {
        let mut args = vec![
            self.binary_path.to_string_lossy().into_owned(),
            "--plugin".to_string(),
            self.plugin_identity.clone(),
            "--entity".to_string(),
            primary.entity().to_string(),
            "--time".to_string(),
            primary.timestamp().to_string(),
        ];

        if !api_key.is_empty() {
            args.push("--key".to_string());
            args.push(api_key.to_string());
        }

        if let Some(lines) = primary.line_count() {
            args.push("--lines-in-file".to_string());
            args.push(lines.to_string());
        }

        if let Some(line) = primary.line_number() {
            args.push("--lineno".to_string());
            args.push(line.to_string());
        }

        if let Some(cursor) = primary.cursor_position() {
            args.push("--cursorpos".to_string());
            args.push(cursor.to_string());
        }

        if let Some(project) = primary.project() {
            args.push("--alternate-project".to_string());
            args.push(project.to_string());
        }

        if let Some(language) = primary.language() {
            args.push("--alternate-language".to_string());
            args.push(language.to_string());
        }

        if primary.is_write() {
            args.push("--write".to_string());
        }

        if primary.is_unsaved_file() {
            args.push("--is-unsaved-entity".to_string());
        }

        if primary.is_building() {
            args.push("--category".to_string());
            args.push("building".to_string());
        }

        if settings.debug {
            args.push("--verbose".to_string());
        }

        if let Some(proxy) = settings.proxy() {
            args.push("--proxy".to_string());
            args.push(proxy.to_string());
        }

        if !extras.is_empty() {
            args.push("--extra-heartbeats".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::Timestamp;
    use std::num::NonZeroU32;

    fn builder() -> CommandBuilder {
        CommandBuilder::new("/w/wakatime-cli-linux-amd64", "vim/9.1 vim-wakatime/0.1.0")
    }

    fn heartbeat(entity: &str, time: &str) -> Heartbeat {
        Heartbeat::new(entity, time.parse::<Timestamp>().unwrap()).unwrap()
    }

    /// Value following `flag`, if the flag is present.
    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_minimal_command() {
        let args = builder().build(
            &heartbeat("/src/main.rs", "100"),
            "",
            &[],
            &Settings::default(),
        );

        assert_eq!(
            args,
            [
                "/w/wakatime-cli-linux-amd64",
                "--plugin",
                "vim/9.1 vim-wakatime/0.1.0",
                "--entity",
                "/src/main.rs",
                "--time",
                "100.0000",
            ]
        );
    }

    #[test]
    fn test_every_rule_applied() {
        let primary = heartbeat("/src/lib.rs", "1700000000.25")
            .with_line_count(300)
            .with_line_number(NonZeroU32::new(42).unwrap())
            .with_cursor_position(7)
            .with_project("agent")
            .with_language("Rust")
            .with_write(true)
            .with_unsaved_file(true)
            .with_building(true);
        let settings = Settings {
            proxy: "http://proxy:3128".to_string(),
            show_in_status_bar: true,
            debug: true,
        };

        let args = builder().build(&primary, "waka_123", &[heartbeat("/b", "1")], &settings);

        assert_eq!(value_of(&args, "--time"), Some("1700000000.2500"));
        assert_eq!(value_of(&args, "--key"), Some("waka_123"));
        assert_eq!(value_of(&args, "--lines-in-file"), Some("300"));
        assert_eq!(value_of(&args, "--lineno"), Some("42"));
        assert_eq!(value_of(&args, "--cursorpos"), Some("7"));
        assert_eq!(value_of(&args, "--alternate-project"), Some("agent"));
        assert_eq!(value_of(&args, "--alternate-language"), Some("Rust"));
        assert_eq!(value_of(&args, "--category"), Some("building"));
        assert_eq!(value_of(&args, "--proxy"), Some("http://proxy:3128"));
        for flag in ["--write", "--is-unsaved-entity", "--verbose", "--extra-heartbeats"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert_eq!(args.last().map(String::as_str), Some("--extra-heartbeats"));
    }

    #[test]
    fn test_extra_flag_only_with_extras() {
        let primary = heartbeat("/a", "1");
        let settings = Settings::default();

        let without = builder().build(&primary, "", &[], &settings);
        assert!(!without.iter().any(|a| a == "--extra-heartbeats"));

        let with = builder().build(
            &primary,
            "",
            &[heartbeat("/b", "2"), heartbeat("/c", "3")],
            &settings,
        );
        assert!(with.iter().any(|a| a == "--extra-heartbeats"));
        assert_eq!(value_of(&with, "--entity"), Some("/a"));
        assert_eq!(value_of(&with, "--time"), Some("1.0000"));
    }

    #[test]
    fn test_blank_proxy_and_key_omitted() {
        let settings = Settings {
            proxy: "   ".to_string(),
            ..Settings::default()
        };
        let args = builder().build(&heartbeat("/a", "1"), "", &[], &settings);
        assert!(!args.iter().any(|a| a == "--proxy" || a == "--key" || a == "--verbose"));
    }
}
