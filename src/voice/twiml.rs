//! Call-control documents (TwiML) returned to the telephony provider.

use quick_xml::escape::escape;

/// Content type for call-control responses.
pub const CONTENT_TYPE: &str = "text/xml";

/// Digit-capture directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gather {
    pub action: String,
    pub timeout_secs: u32,
    pub num_digits: u32,
    /// Prompt played while waiting for input.
    pub play: Option<String>,
}

impl Gather {
    /// DTMF capture of exactly six digits with a ten second timeout, posting
    /// the digits to `action`.
    pub fn dtmf(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            timeout_secs: 10,
            num_digits: 6,
            play: None,
        }
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.play = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Gather(Gather),
    Play(String),
    Redirect(String),
    Say(String),
    Hangup,
}

/// An ordered list of verbs rendered as a `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Render the document.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        if self.verbs.is_empty() {
            out.push_str("<Response/>");
            return out;
        }

        out.push_str("<Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Gather(g) => {
                    out.push_str(&format!(
                        r#"<Gather input="dtmf" timeout="{}" numDigits="{}" action="{}" method="POST">"#,
                        g.timeout_secs,
                        g.num_digits,
                        escape(g.action.as_str()),
                    ));
                    if let Some(url) = &g.play {
                        out.push_str(&format!("<Play>{}</Play>", escape(url.as_str())));
                    }
                    out.push_str("</Gather>");
                }
                Verb::Play(url) => {
                    out.push_str(&format!("<Play>{}</Play>", escape(url.as_str())));
                }
                Verb::Redirect(url) => {
                    out.push_str(&format!(
                        r#"<Redirect method="POST">{}</Redirect>"#,
                        escape(url.as_str())
                    ));
                }
                Verb::Say(text) => {
                    out.push_str(&format!("<Say>{}</Say>", escape(text.as_str())));
                }
                Verb::Hangup => out.push_str("<Hangup/>"),
            }
        }
        out.push_str("</Response>");
        out
    }
}

impl std::fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_then_redirect() {
        let xml = VoiceResponse::new()
            .gather(
                Gather::dtmf("https://cb.example/status/s3cret?service=paypal")
                    .play("https://cb.example/stream/paypal"),
            )
            .redirect("https://cb.example/voice/s3cret?service=paypal&attempt=1")
            .to_xml();

        assert!(xml.contains(
            r#"<Gather input="dtmf" timeout="10" numDigits="6" action="https://cb.example/status/s3cret?service=paypal" method="POST"><Play>https://cb.example/stream/paypal</Play></Gather>"#
        ));
        assert!(xml.contains(
            r#"<Redirect method="POST">https://cb.example/voice/s3cret?service=paypal&amp;attempt=1</Redirect>"#
        ));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn say_text_is_escaped() {
        let xml = VoiceResponse::new().say("Tom & <Jerry>").to_xml();
        assert!(xml.contains("<Say>Tom &amp; &lt;Jerry&gt;</Say>"));
    }

    #[test]
    fn empty_response_is_self_closing() {
        assert!(VoiceResponse::new().to_xml().ends_with("<Response/>"));
    }

    #[test]
    fn play_then_hangup() {
        let xml = VoiceResponse::new()
            .play("https://cb.example/stream/end")
            .hangup()
            .to_xml();
        assert!(xml.ends_with("<Play>https://cb.example/stream/end</Play><Hangup/></Response>"));
    }
}
