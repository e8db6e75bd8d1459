use crate::url_list::UrlList;
use crate::verbosity::Verbosity;
use anyhow::{Context, Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use dispatch_lib::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, Method,
};
use http::{
    HeaderMap,
    header::{HeaderName, HeaderValue},
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};
use strum::{Display, EnumIter, EnumString, VariantNames};

pub(crate) const DISPATCH_CONFIG_FILE: &str = "dispatch.toml";

/// Marker for reading URLs from stdin instead of the command line
pub(crate) const STDIN_INPUT: &str = "-";

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const CONCURRENCY_STR: &str = concatcp!(DEFAULT_CONCURRENCY);
const MAX_REDIRECTS_STR: &str = concatcp!(DEFAULT_MAX_REDIRECTS);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_SECS);
// A custom help message shows the default config file while still letting
// us tell whether the user provided one. Only an explicitly given file has
// to exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    DISPATCH_CONFIG_FILE,
);

/// HTTP method used for every request
#[derive(
    Debug, Deserialize, Default, Clone, Copy, Display, EnumIter, EnumString, VariantNames, PartialEq, Eq,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RequestMethod {
    #[default]
    Get,
    Post,
    Head,
}

impl RequestMethod {
    /// Whether requests of this method carry the configured body
    pub(crate) const fn has_body(self) -> bool {
        matches!(self, RequestMethod::Post)
    }
}

impl From<RequestMethod> for Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post => Method::POST,
            RequestMethod::Head => Method::HEAD,
        }
    }
}

/// The format of the per-request lines and the summary
#[derive(
    Debug, Deserialize, Default, Clone, Copy, Display, EnumIter, EnumString, VariantNames, PartialEq, Eq,
)]
#[non_exhaustive]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// `[200] https://example.com/`, followed by a one line summary
    #[default]
    Plain,
    /// One JSON object per request, followed by a JSON summary
    Json,
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    concurrency: usize = DEFAULT_CONCURRENCY;
    max_redirects: usize = DEFAULT_MAX_REDIRECTS;
    timeout: u64 = DEFAULT_TIMEOUT_SECS;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Parse a single header into a [`HeaderName`] and [`HeaderValue`]
///
/// Headers are expected to be in format `Header-Name: Header-Value`.
/// The header name and value are trimmed of whitespace.
///
/// If the header contains multiple colons, the part after the first colon is
/// considered the value.
///
/// # Errors
///
/// This fails if the header does not contain a `:` character or if the
/// header name contains non-ASCII characters.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let parts: Vec<&str> = header.splitn(2, ':').collect();
    match parts.as_slice() {
        [name, value] => {
            let name = name.trim();
            let name = HeaderName::from_str(name)
                .map_err(|e| anyhow!("Unable to convert header name '{name}': {e}"))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
            Ok((name, value))
        }
        _ => Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        )),
    }
}

/// Parses a single HTTP header into a tuple of (String, String)
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let invalid = |message: String| clap::Error::raw(clap::error::ErrorKind::InvalidValue, message);

        let header_str = value
            .to_str()
            .ok_or_else(|| invalid("Header value contains invalid UTF-8".to_string()))?;
        let (name, value) = parse_single_header(header_str).map_err(|e| invalid(e.to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| invalid("Header value contains invalid UTF-8".to_string()))?;
        Ok((name.to_string(), value.to_string()))
    }
}

/// Extension trait for converting a Vec of header pairs to a `HeaderMap`
pub(crate) trait HeaderMapExt {
    /// Convert a collection of header key-value pairs to a `HeaderMap`
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value '{value}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

/// dispatch sends HTTP requests to many URLs concurrently, using a fixed
/// number of workers and an optional minimum delay between two requests to
/// the same host.
///
/// dispatch is powered by dispatch-lib.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct DispatchOptions {
    /// URLs to send requests to
    #[arg(
        name = "inputs",
        required_unless_present = "input_file",
        long_help = "URLs to send requests to. Use `-` to read newline-separated URLs from
standard input. Alternatively, use `--input-file` to read them from a file.

NOTE: Use `--` to separate inputs from options that allow multiple arguments."
    )]
    raw_inputs: Vec<String>,

    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl DispatchOptions {
    /// All URLs to send requests to, in order: command line arguments first
    /// (with `-` expanded to the lines read from stdin), then the lines of
    /// `--input-file`.
    pub(crate) fn inputs(&self) -> Result<Vec<String>> {
        let mut inputs = Vec::with_capacity(self.raw_inputs.len());
        for raw_input in &self.raw_inputs {
            if raw_input == STDIN_INPUT {
                let stdin = UrlList::from_reader(std::io::stdin())
                    .context("Cannot read URLs from stdin")?;
                inputs.extend(stdin.urls);
            } else {
                inputs.push(raw_input.clone());
            }
        }

        if let Some(input_file) = &self.config.input_file {
            let list = UrlList::try_from(input_file.as_path())
                .context("Cannot read URLs from --input-file")?;
            inputs.extend(list.urls);
        }

        Ok(inputs)
    }
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// The main configuration for dispatch
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Read URLs from the given file or stdin (if path is '-').
    #[arg(
        long,
        value_name = "PATH",
        long_help = "Read URLs from the given file or stdin (if path is '-').

File Format:
- Each line should contain one URL.
- Lines starting with '#' are treated as comments and ignored.
- Empty lines are also ignored."
    )]
    #[serde(default)]
    pub(crate) input_file: Option<PathBuf>,

    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Number of requests executed concurrently
    #[arg(long, default_value = &CONCURRENCY_STR)]
    #[serde(default = "concurrency")]
    pub(crate) concurrency: usize,

    /// Minimum delay between two requests to the same host (e.g. `500ms`, `2s`).
    /// `0s` disables rate limiting.
    #[arg(
        short = 'r',
        long,
        value_parser = humantime::parse_duration,
        default_value = "0s",
        verbatim_doc_comment
    )]
    #[serde(default, with = "humantime_serde")]
    pub(crate) rate_limit: Duration,

    /// Website timeout in seconds from connect to response finished.
    /// `0` disables the timeout.
    #[arg(short, long, default_value = &TIMEOUT_STR, verbatim_doc_comment)]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// Do not follow redirects; report the redirect response instead
    #[arg(long)]
    #[serde(default)]
    pub(crate) no_redirects: bool,

    /// Maximum number of allowed redirects
    #[arg(short, long, default_value = &MAX_REDIRECTS_STR)]
    #[serde(default = "max_redirects")]
    pub(crate) max_redirects: usize,

    /// Proceed for server connections considered insecure (invalid TLS)
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) insecure: bool,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long,
        action = clap::ArgAction::Append,
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

You can specify custom headers in the format 'Name: Value'. For example, 'Accept: text/html'.
Multiple headers can be specified by using the flag multiple times.
The specified headers are used for ALL requests."
    )]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// Request method
    #[arg(
        short = 'X',
        long,
        default_value = "get",
        ignore_case = true,
        value_parser = PossibleValuesParser::new(RequestMethod::VARIANTS).map(|s| s.parse::<RequestMethod>().unwrap_or_default())
    )]
    #[serde(default)]
    pub(crate) method: RequestMethod,

    /// Request body, sent with every POST request
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) body: Option<String>,

    /// Output format of the per-request lines and the summary
    #[arg(
        short,
        long,
        default_value = "plain",
        ignore_case = true,
        value_parser = PossibleValuesParser::new(OutputFormat::VARIANTS).map(|s| s.parse::<OutputFormat>().unwrap_or_default())
    )]
    #[serde(default)]
    pub(crate) format: OutputFormat,

    /// Print per-host rate limiting statistics after all requests completed
    #[arg(long)]
    #[serde(default)]
    pub(crate) host_stats: bool,
}

impl Config {
    /// Special handling for merging headers
    ///
    /// Overwrites existing headers in `self` with the values from `other`.
    /// Header names are compared case-insensitively.
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let lowercase = |(name, value): &(String, String)| (name.to_lowercase(), value.clone());
        let self_map = self.header.iter().map(lowercase).collect::<HashMap<_, _>>();
        let other_map = other.iter().map(lowercase).collect::<HashMap<_, _>>();

        // Merge the two maps, with `other` taking precedence
        let merged_map: HashMap<_, _> = self_map.into_iter().chain(other_map).collect();

        // Convert the merged map back to a Vec of tuples
        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // Special handling for headers before fold_in!
        self.merge_headers(&toml.header);

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,

                // Keys with defaults to assign
                body: None,
                concurrency: DEFAULT_CONCURRENCY,
                format: OutputFormat::default(),
                host_stats: false,
                input_file: None,
                insecure: false,
                max_redirects: DEFAULT_MAX_REDIRECTS,
                method: RequestMethod::default(),
                no_redirects: false,
                rate_limit: Duration::ZERO,
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT,
                verbose: Verbosity::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> DispatchOptions {
        DispatchOptions::parse_from(std::iter::once("dispatch").chain(args.iter().copied()))
    }

    fn from_toml(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        DispatchOptions::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["https://example.com"]).config;
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.rate_limit, Duration::ZERO);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.method, RequestMethod::Get);
        assert_eq!(config.format, OutputFormat::Plain);
        assert!(!config.no_redirects);
        assert!(!config.insecure);
    }

    #[test]
    fn test_toml_defaults_match_cli_defaults() {
        let cli = parse(&["https://example.com"]).config;
        let toml = from_toml("");

        assert_eq!(toml.concurrency, cli.concurrency);
        assert_eq!(toml.rate_limit, cli.rate_limit);
        assert_eq!(toml.timeout, cli.timeout);
        assert_eq!(toml.max_redirects, cli.max_redirects);
        assert_eq!(toml.user_agent, cli.user_agent);
        assert_eq!(toml.method, cli.method);
        assert_eq!(toml.format, cli.format);
        assert_eq!(toml.verbose, cli.verbose);
    }

    #[test]
    fn test_parse_flags() {
        let config = parse(&[
            "--concurrency",
            "4",
            "--rate-limit",
            "250ms",
            "--method",
            "POST",
            "--body",
            "{}",
            "--format",
            "json",
            "https://example.com",
        ])
        .config;
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.rate_limit, Duration::from_millis(250));
        assert_eq!(config.method, RequestMethod::Post);
        assert_eq!(config.body.as_deref(), Some("{}"));
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_prefers_cli_values() {
        let mut cli = parse(&["--concurrency", "4", "https://example.com"]).config;
        cli.merge(from_toml(
            r#"
            concurrency = 50
            rate_limit = "1s"
            user_agent = "custom/1.0"
            host_stats = true
            "#,
        ));

        // Set on the command line
        assert_eq!(cli.concurrency, 4);
        // Left at the default on the command line
        assert_eq!(cli.rate_limit, Duration::from_secs(1));
        assert_eq!(cli.user_agent, "custom/1.0");
        assert!(cli.host_stats);
    }

    #[test]
    fn test_unknown_toml_field() {
        assert!(toml::from_str::<Config>("retries = 3").is_err());
    }

    #[test]
    fn test_parse_custom_headers() {
        assert_eq!(
            parse_single_header("accept:text/html").unwrap(),
            (
                HeaderName::from_static("accept"),
                HeaderValue::from_static("text/html")
            )
        );
        assert_eq!(
            parse_single_header("key:x-test:check=this").unwrap(),
            (
                HeaderName::from_static("key"),
                HeaderValue::from_static("x-test:check=this")
            )
        );
        assert!(parse_single_header("no-colon").is_err());
    }

    #[test]
    fn test_merge_headers_with_config() {
        let mut cli = parse(&["-H", "X-Test: check=that", "https://example.com"]).config;
        cli.merge(from_toml(
            r#"
            [header]
            Accept = "text/html"
            X-Test = "check=this"
            "#,
        ));

        cli.header.sort();
        assert_eq!(
            cli.header,
            vec![
                ("accept".to_string(), "text/html".to_string()),
                ("x-test".to_string(), "check=this".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_map() {
        let headers = HeaderMap::from_header_pairs(&[(
            "X-Test".to_string(),
            "check=this".to_string(),
        )])
        .unwrap();
        assert_eq!(headers["x-test"], "check=this");
    }

    #[test]
    fn test_inputs_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        fs::write(&path, "https://b.example/\n# skipped\nhttps://c.example/\n").unwrap();

        let opts = parse(&[
            "https://a.example/",
            "--input-file",
            path.to_str().unwrap(),
        ]);
        assert_eq!(
            opts.inputs().unwrap(),
            vec![
                "https://a.example/",
                "https://b.example/",
                "https://c.example/"
            ]
        );
    }
}
