//! Construction of the default network transport.
//!
//! [`ClientBuilder`] configures a [`reqwest::Client`] with the knobs a
//! request pipeline usually needs: a per-request timeout, the redirect
//! policy, certificate verification and default headers.
#![allow(clippy::module_name_repetitions, clippy::struct_excessive_bools)]
use http::header::{HeaderMap, HeaderValue};
use reqwest::header;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::{ErrorKind, Result};

/// Default number of redirects followed before a request is deemed as failed, 10.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Default timeout in seconds before a request is deemed as failed, 30.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default user agent, `dispatch/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("dispatch/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a Client.
const CONNECT_TIMEOUT: u64 = 10;
/// TCP keepalive
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: u64 = 60;

/// Builder for the [`reqwest::Client`] used as the default transport.
///
/// ```
/// use dispatch_lib::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::builder()
///     .timeout(Duration::from_secs(5))
///     .follow_redirects(false)
///     .build()
///     .client()
///     .unwrap();
/// # drop(client);
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// Timeout for a whole request, from connecting until the body has been
    /// read. `None` disables the timeout.
    #[builder(default = Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))]
    timeout: Option<Duration>,

    /// When `false`, redirects are not followed and the redirect response
    /// itself is handed to the callback.
    #[builder(default = true)]
    follow_redirects: bool,

    /// Maximum number of redirects per request before returning an error.
    /// Only relevant when redirects are followed.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// When `true`, accept invalid SSL certificates.
    ///
    /// ## Warning
    ///
    /// You should think very carefully before using this method. If
    /// invalid certificates are trusted, any certificate for any site
    /// will be trusted for use. This includes expired certificates. This
    /// introduces significant vulnerabilities, and should only be used
    /// as a last resort.
    allow_insecure: bool,

    /// User-agent sent with every request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Additional headers sent with every request.
    custom_headers: HeaderMap,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<reqwest::Client> {
        let Self {
            timeout,
            follow_redirects,
            max_redirects,
            allow_insecure,
            user_agent,
            custom_headers: mut headers,
        } = self;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(ErrorKind::InvalidHeader)?,
        );

        let redirect_policy = if follow_redirects {
            reqwest::redirect::Policy::limited(max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(allow_insecure)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE))
            .redirect(redirect_policy);

        (match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildRequestClient)
    }
}
