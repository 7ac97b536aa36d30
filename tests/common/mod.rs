#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use course_monitor::models::{Config, Destination};
use course_monitor::services::{Channel, ChannelError};

pub const LOGIN_PATH: &str = "/login/index.php";

/// Configuration pointing every portal URL at a mock server.
pub fn test_config(server_uri: &str, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.portal.base_url = format!("{server_uri}/");
    config.portal.login_url = format!("{server_uri}{LOGIN_PATH}");
    config.portal.timeout_secs = 5;
    config.credentials.username = "student".into();
    config.credentials.password = "secret".into();
    config.telegram.bot_token = "123:abc".into();
    config.delivery.send_delay_secs = 0;
    config.delivery.module_delay_secs = 0;
    config.paths.data_dir = data_dir.to_path_buf();
    config
}

pub fn login_form(token: &str) -> String {
    format!(
        r#"<html><body><form action="{LOGIN_PATH}" method="post" id="login">
            <input type="hidden" name="logintoken" value="{token}">
            <input type="text" name="username" id="username">
            <input type="password" name="password" id="password">
        </form></body></html>"#
    )
}

pub const EXPIRED_PAGE: &str =
    r#"<html><body><div class="notloggedin">You are not logged in.</div></body></html>"#;

/// A course page listing `(href, name)` file resources.
pub fn course_page(resources: &[(&str, &str)]) -> String {
    let items: String = resources
        .iter()
        .map(|(href, name)| {
            format!(
                r#"<li class="activity resource modtype_resource">
                    <div class="activityinstance"><a href="{href}">
                    <span class="instancename">{name}<span class="accesshide "> Fichier</span></span>
                    </a></div></li>"#
            )
        })
        .collect();
    format!(r#"<html><body><ul class="topics">{items}</ul></body></html>"#)
}

/// What the mock channel was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        to: Destination,
        text: String,
    },
    Document {
        to: Destination,
        filename: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

/// Records every send attempt and answers from a script (then `Ok`).
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<Sent>>,
    script: Mutex<VecDeque<Result<(), ChannelError>>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(answers: Vec<Result<(), ChannelError>>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(answers.into()),
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn answer(&self, sent: Sent) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(sent);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn send_text(&self, to: &Destination, text: &str) -> Result<(), ChannelError> {
        self.answer(Sent::Text {
            to: *to,
            text: text.to_string(),
        })
    }

    async fn send_document(
        &self,
        to: &Destination,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), ChannelError> {
        self.answer(Sent::Document {
            to: *to,
            filename: filename.to_string(),
            bytes,
            caption: caption.to_string(),
        })
    }
}
