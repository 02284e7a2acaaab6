//! Transport to the MMseqs2 web service.
use crate::error::Result;
use crate::status::Ticket;
use log::debug;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://a3m.mmseqs.com";
pub const DEFAULT_TEMPLATE_HOST: &str = "https://a3m-templates.mmseqs.com";

/// The requests the client makes against the server.
///
/// Transport failures are returned as errors. Responses the server produced but
/// that do not parse are reported as an `UNKNOWN` ticket instead.
pub trait MsaService {
    fn submit(&self, query: &str, mode: &str) -> Result<Ticket>;
    fn status(&self, id: &str) -> Result<Ticket>;
    /// Stream the finished result archive to `destination`.
    fn download(&self, id: &str, destination: &Path) -> Result<()>;
    /// Stream a tar.gz bundle of template structures for `template_ids` to `destination`.
    fn download_templates(&self, template_ids: &[String], destination: &Path) -> Result<()>;
}

pub struct HttpMsaService {
    client: reqwest::blocking::Client,
    host: String,
    template_host: String,
}

impl HttpMsaService {
    pub fn new(host: &str, template_host: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ferritin-mmseqs/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(60))
            .timeout(None)
            .build()?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            template_host: template_host.trim_end_matches('/').to_string(),
        })
    }

    /// Client for the public MMseqs2 and template servers.
    pub fn public() -> Result<Self> {
        Self::new(DEFAULT_HOST, DEFAULT_TEMPLATE_HOST)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn template_host(&self) -> &str {
        &self.template_host
    }

    fn stream_to(&self, url: &str, destination: &Path) -> Result<()> {
        debug!("GET {}", url);
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let mut writer = BufWriter::new(File::create(destination)?);
        response.copy_to(&mut writer)?;
        Ok(())
    }
}


impl MsaService for HttpMsaService {
    fn submit(&self, query: &str, mode: &str) -> Result<Ticket> {
        let url = format!("{}/ticket/msa", self.host);
        debug!("POST {} (mode={})", url, mode);
        let body = self
            .client
            .post(&url)
            .form(&[("q", query), ("mode", mode)])
            .send()?
            .text()?;
        Ok(Ticket::from_body(&body))
    }

    fn status(&self, id: &str) -> Result<Ticket> {
        let url = format!("{}/ticket/{}", self.host, id);
        let body = self.client.get(&url).send()?.text()?;
        Ok(Ticket::from_body(&body))
    }

    fn download(&self, id: &str, destination: &Path) -> Result<()> {
        let url = format!("{}/result/download/{}", self.host, id);
        self.stream_to(&url, destination)
    }

    fn download_templates(&self, template_ids: &[String], destination: &Path) -> Result<()> {
        let url = format!("{}/template/{}", self.template_host, template_ids.join(","));
        self.stream_to(&url, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_service_uses_default_hosts() {
        let service = HttpMsaService::public().unwrap();
        assert_eq!(service.host(), DEFAULT_HOST);
        assert_eq!(service.template_host(), DEFAULT_TEMPLATE_HOST);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let service = HttpMsaService::new("http://localhost:8080/", "http://localhost:8081//").unwrap();
        assert_eq!(service.host(), "http://localhost:8080");
        assert_eq!(service.template_host(), "http://localhost:8081");
    }
}
