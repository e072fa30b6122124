//! Reference analyzer for raw HTTP/1.x messages.

use url::Url;

use super::{HttpService, MessageAnalyzer, RequestInfo, ResponseInfo};
use crate::error::{GqlScopeError, Result};

/// Parses the request line, the status line, and the header/body boundary.
///
/// Headers themselves are not interpreted: the URL comes from the request
/// target and the service the proxy reports, not from `Host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http1Analyzer;

impl MessageAnalyzer for Http1Analyzer {
    fn analyze_request(&self, service: &HttpService, raw: &[u8]) -> Result<RequestInfo> {
        let line = first_line(raw)?;
        let mut parts = line.split_ascii_whitespace();
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("request line", line));
        };
        if !version.starts_with("HTTP/") {
            return Err(malformed("request line", line));
        }

        Ok(RequestInfo {
            url: request_url(service, target)?,
            method: method.to_string(),
            body_offset: body_offset(raw),
        })
    }

    fn analyze_response(&self, raw: &[u8]) -> Result<ResponseInfo> {
        let line = first_line(raw)?;
        let mut parts = line.split_ascii_whitespace();
        let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
            return Err(malformed("status line", line));
        };
        if !version.starts_with("HTTP/") {
            return Err(malformed("status line", line));
        }
        let status_code = code
            .parse::<u16>()
            .map_err(|_| malformed("status code", code))?;
        Ok(ResponseInfo { status_code })
    }
}

/// Absolute-form targets are taken as they are. Anything else is resolved
/// against the service the proxy reports.
fn request_url(service: &HttpService, target: &str) -> Result<String> {
    if let Ok(url) = Url::parse(target) {
        if url.has_host() {
            return Ok(url.into());
        }
    }
    let base = service.base_url()?;
    let url = if target.starts_with('/') {
        base.join(target)?
    } else {
        // authority-form (CONNECT) and asterisk-form
        base.join(&format!("/{}", target))?
    };
    Ok(url.into())
}

fn first_line(raw: &[u8]) -> Result<&str> {
    let end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len());
    let line = std::str::from_utf8(&raw[..end])
        .map_err(|_| GqlScopeError::MalformedMessage("start line is not UTF-8".to_string()))?
        .trim_end_matches('\r');
    if line.trim().is_empty() {
        return Err(GqlScopeError::MalformedMessage("empty start line".to_string()));
    }
    Ok(line)
}

/// First byte after the blank line ending the headers, or the buffer length.
fn body_offset(raw: &[u8]) -> usize {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => raw.len(),
    }
}

fn malformed(what: &str, got: &str) -> GqlScopeError {
    let got: String = got.chars().take(80).collect();
    GqlScopeError::MalformedMessage(format!("bad {}: {:?}", what, got))
}
