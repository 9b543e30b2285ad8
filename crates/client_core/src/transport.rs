//! XML-RPC over HTTP POST.

use std::{collections::BTreeMap, error::Error as _, fmt::Display, time::Duration};

use async_trait::async_trait;
use quick_xml::{escape::escape, events::Event, Reader};
use reqwest::{header::CONTENT_TYPE, Client};
use shared::{error::TransportError, protocol::Value};
use tracing::debug;
use url::Url;

use crate::{ClientSettings, RemoteCall};

const DNS_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "nodename nor servname",
];

#[derive(Debug, Clone)]
pub struct XmlRpcTransport {
    client: Client,
    endpoint: Option<Url>,
    timeout: Duration,
}

impl XmlRpcTransport {
    /// `endpoint` may be `None`; every call then fails as not configured.
    pub fn new(endpoint: Option<Url>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Other(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, TransportError> {
        Self::new(settings.server_url(), settings.request_timeout())
    }

    fn map_send_error(&self, endpoint: &Url, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout(self.timeout);
        }
        if err.is_connect() {
            if is_dns_failure(&err) {
                return TransportError::UnknownHost {
                    host: endpoint.host_str().unwrap_or_default().to_string(),
                };
            }
            return TransportError::ConnectionRefused {
                endpoint: endpoint.to_string(),
            };
        }
        TransportError::Other(error_chain(&err))
    }
}

#[async_trait]
impl RemoteCall for XmlRpcTransport {
    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_ref().map(Url::as_str)
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(TransportError::NotConfigured);
        };

        let body = encode_call(method, &args);
        debug!(%endpoint, method, bytes = body.len(), "sending xml-rpc request");
        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|err| self.map_send_error(endpoint, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|err| self.map_send_error(endpoint, err))?;
        decode_response(&text)
    }
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    let chain = error_chain(err).to_ascii_lowercase();
    DNS_MARKERS.iter().any(|marker| chain.contains(marker))
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub fn encode_call(method: &str, args: &[Value]) -> String {
    let mut body = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    body.push_str(&escape(method));
    body.push_str("</methodName><params>");
    for arg in args {
        body.push_str("<param>");
        encode_value(&mut body, arg);
        body.push_str("</param>");
    }
    body.push_str("</params></methodCall>");
    body
}

fn encode_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(value) => out.push_str(if *value {
            "<boolean>1</boolean>"
        } else {
            "<boolean>0</boolean>"
        }),
        Value::Int(value) if i32::try_from(*value).is_ok() => {
            out.push_str(&format!("<int>{value}</int>"))
        }
        Value::Int(value) => out.push_str(&format!("<i8>{value}</i8>")),
        Value::Double(value) => out.push_str(&format!("<double>{value}</double>")),
        Value::String(value) => {
            out.push_str("<string>");
            out.push_str(&escape(value.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Decodes a `methodResponse`. Faults come back as [`TransportError::Fault`].
pub fn decode_response(body: &str) -> Result<Value, TransportError> {
    let mut cursor = XmlCursor::new(body);
    cursor.expect_open("methodResponse")?;
    let value = match cursor.next_tag()? {
        Token::Empty(name) if name == "params" => Value::Nil,
        Token::Open(name) if name == "params" => match cursor.next_tag()? {
            Token::Open(name) if name == "param" => {
                let value = cursor.value()?;
                cursor.expect_close("param")?;
                cursor.expect_close("params")?;
                value
            }
            Token::Close(name) if name == "params" => Value::Nil,
            other => return Err(unexpected("param", &other)),
        },
        Token::Open(name) if name == "fault" => {
            let fault = cursor.value()?;
            return Err(fault_error(&fault));
        }
        other => return Err(unexpected("params", &other)),
    };
    cursor.expect_close("methodResponse")?;
    Ok(value)
}

fn fault_error(fault: &Value) -> TransportError {
    let code = match fault.member("faultCode") {
        Some(Value::Int(code)) => *code,
        _ => 0,
    };
    let message = fault
        .member("faultString")
        .map(ToString::to_string)
        .unwrap_or_else(|| fault.to_string());
    TransportError::Fault { code, message }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
    Eof,
}

struct XmlCursor<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> XmlCursor<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            reader: Reader::from_str(body),
        }
    }

    fn next(&mut self) -> Result<Token, TransportError> {
        loop {
            let token = match self.reader.read_event().map_err(protocol_error)? {
                Event::Start(tag) => Token::Open(tag_name(tag.name().as_ref())),
                Event::End(tag) => Token::Close(tag_name(tag.name().as_ref())),
                Event::Empty(tag) => Token::Empty(tag_name(tag.name().as_ref())),
                Event::Text(text) => {
                    Token::Text(text.unescape().map_err(protocol_error)?.into_owned())
                }
                Event::CData(data) => {
                    Token::Text(String::from_utf8_lossy(&data.into_inner()).into_owned())
                }
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    /// Next token that is not inter-element whitespace.
    fn next_tag(&mut self) -> Result<Token, TransportError> {
        loop {
            match self.next()? {
                Token::Text(text) if text.trim().is_empty() => continue,
                token => return Ok(token),
            }
        }
    }

    fn expect_open(&mut self, name: &str) -> Result<(), TransportError> {
        match self.next_tag()? {
            Token::Open(found) if found == name => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    fn expect_close(&mut self, name: &str) -> Result<(), TransportError> {
        match self.next_tag()? {
            Token::Close(found) if found == name => Ok(()),
            other => Err(unexpected(&format!("/{name}"), &other)),
        }
    }

    fn read_text(&mut self, tag: &str) -> Result<String, TransportError> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::Close(found) if found == tag => return Ok(text),
                other => return Err(unexpected(&format!("/{tag}"), &other)),
            }
        }
    }

    fn value(&mut self) -> Result<Value, TransportError> {
        match self.next_tag()? {
            Token::Open(name) if name == "value" => self.value_body(),
            Token::Empty(name) if name == "value" => Ok(Value::String(String::new())),
            other => Err(unexpected("value", &other)),
        }
    }

    /// Content of an open `<value>`. Untyped text is a string.
    fn value_body(&mut self) -> Result<Value, TransportError> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::Close(name) if name == "value" => return Ok(Value::String(text)),
                Token::Open(tag) if text.trim().is_empty() => {
                    let value = self.typed(&tag)?;
                    self.expect_close("value")?;
                    return Ok(value);
                }
                Token::Empty(tag) if text.trim().is_empty() => {
                    let value = empty_typed(&tag)?;
                    self.expect_close("value")?;
                    return Ok(value);
                }
                other => return Err(unexpected("/value", &other)),
            }
        }
    }

    fn typed(&mut self, tag: &str) -> Result<Value, TransportError> {
        match tag {
            "string" | "dateTime.iso8601" | "base64" => Ok(Value::String(self.read_text(tag)?)),
            "int" | "i4" | "i8" => {
                let raw = self.read_text(tag)?;
                raw.trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| invalid_scalar(tag, &raw))
            }
            "boolean" => {
                let raw = self.read_text(tag)?;
                match raw.trim() {
                    "1" | "true" => Ok(Value::Bool(true)),
                    "0" | "false" => Ok(Value::Bool(false)),
                    _ => Err(invalid_scalar(tag, &raw)),
                }
            }
            "double" => {
                let raw = self.read_text(tag)?;
                raw.trim()
                    .parse()
                    .map(Value::Double)
                    .map_err(|_| invalid_scalar(tag, &raw))
            }
            "nil" => {
                self.expect_close("nil")?;
                Ok(Value::Nil)
            }
            "array" => self.array(),
            "struct" => self.structure(),
            other => Err(TransportError::Protocol(format!(
                "unsupported value type <{other}>"
            ))),
        }
    }

    fn array(&mut self) -> Result<Value, TransportError> {
        let mut items = Vec::new();
        match self.next_tag()? {
            Token::Empty(name) if name == "data" => {}
            Token::Open(name) if name == "data" => loop {
                match self.next_tag()? {
                    Token::Open(name) if name == "value" => items.push(self.value_body()?),
                    Token::Empty(name) if name == "value" => {
                        items.push(Value::String(String::new()))
                    }
                    Token::Close(name) if name == "data" => break,
                    other => return Err(unexpected("value", &other)),
                }
            },
            other => return Err(unexpected("data", &other)),
        }
        self.expect_close("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value, TransportError> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_tag()? {
                Token::Open(name) if name == "member" => {
                    self.expect_open("name")?;
                    let name = self.read_text("name")?;
                    let value = self.value()?;
                    self.expect_close("member")?;
                    members.insert(name, value);
                }
                Token::Close(name) if name == "struct" => break,
                other => return Err(unexpected("member", &other)),
            }
        }
        Ok(Value::Struct(members))
    }
}

fn empty_typed(tag: &str) -> Result<Value, TransportError> {
    match tag {
        "string" | "dateTime.iso8601" | "base64" => Ok(Value::String(String::new())),
        "nil" => Ok(Value::Nil),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        other => Err(TransportError::Protocol(format!("empty <{other}/> value"))),
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn unexpected(expected: &str, found: &Token) -> TransportError {
    TransportError::Protocol(format!("expected <{expected}>, found {found:?}"))
}

fn invalid_scalar(tag: &str, raw: &str) -> TransportError {
    TransportError::Protocol(format!("invalid <{tag}> value '{raw}'"))
}

fn protocol_error(err: impl Display) -> TransportError {
    TransportError::Protocol(err.to_string())
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
