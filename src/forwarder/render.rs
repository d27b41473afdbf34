use crate::message::{Address, Message};

/// Characters MarkdownV2 requires to be backslash-escaped in regular text.
const MARKDOWN_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '"',
];

const BODY_PLACEHOLDER: &str = "message body cannot be displayed";

/// Render a message as MarkdownV2 text. With no template the default layout
/// applies: envelope lines followed by the quoted body. A template replaces
/// the layout; its `{{placeholder}}` references are substituted per message.
pub(super) fn render(message: &Message, template: Option<&str>) -> String {
    match template {
        Some(template) => render_template(message, template),
        None => render_default(message),
    }
}

fn render_default(message: &Message) -> String {
    let mut out = String::new();

    address_line(&mut out, "From", &message.from);
    address_line(&mut out, "To", &message.to);
    address_line(&mut out, "Reply To", &message.reply_to);
    address_line(&mut out, "CC", &message.cc);
    address_line(&mut out, "BCC", &message.bcc);

    if let Some(subject) = &message.subject {
        out.push_str(&format!("*Subject*: {}\n", escape_markdown(subject)));
    }
    if message.date.is_some() {
        out.push_str(&format!("*Date*: {}\n", date_text(message)));
    }

    out.push('\n');
    out.push_str(&body_text(message));

    out.trim().to_string()
}

/// Substitute `{{name}}` references with the same pre-escaped fields the
/// default layout is built from. Unknown references are left verbatim.
fn render_template(message: &Message, template: &str) -> String {
    let mut out = template.to_string();

    for (name, value) in [
        ("from", address_list(&message.from)),
        ("to", address_list(&message.to)),
        ("reply_to", address_list(&message.reply_to)),
        ("cc", address_list(&message.cc)),
        ("bcc", address_list(&message.bcc)),
        (
            "subject",
            message
                .subject
                .as_deref()
                .map(escape_markdown)
                .unwrap_or_default(),
        ),
        ("date", date_text(message)),
        ("body", body_text(message)),
    ] {
        out = out.replace(&format!("{{{{{name}}}}}"), &value);
    }

    out.trim().to_string()
}

fn address_line(out: &mut String, label: &str, addresses: &[Address]) {
    if addresses.is_empty() {
        return;
    }

    out.push_str(&format!("*{label}*: {}\n", address_list(addresses)));
}

fn address_list(addresses: &[Address]) -> String {
    let rendered: Vec<String> = addresses
        .iter()
        .map(|address| match &address.address {
            Some(addr) => format!("[{}](mailto://{addr})", escape_markdown(addr)),
            None => escape_markdown(&address.to_string()),
        })
        .collect();

    rendered.join(", ")
}

fn date_text(message: &Message) -> String {
    message
        .date
        .map(|date| escape_markdown(&date.format("%b %d %Y %H:%M:%S").to_string()))
        .unwrap_or_default()
}

fn body_text(message: &Message) -> String {
    let html = message
        .body
        .iter()
        .filter(|segment| segment.mime_type == "text/html")
        .map(|segment| html2text::from_read(segment.body.as_slice(), 78))
        .collect::<Vec<_>>();
    if !html.is_empty() {
        return quote_block(&escape_markdown(&html.join("\n")));
    }

    let plain = message
        .body
        .iter()
        .filter(|segment| segment.mime_type == "text/plain")
        .map(|segment| segment.text().into_owned())
        .collect::<Vec<_>>();
    if !plain.is_empty() {
        return quote_block(&escape_markdown(&plain.join("\n")));
    }

    BODY_PLACEHOLDER.to_string()
}

pub(super) fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Prefix every line with '>' to form a Markdown quote block.
fn quote_block(text: &str) -> String {
    text.lines()
        .map(|line| format!(">{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on char boundaries into chunks of at most `limit` bytes.
pub(super) fn chunks(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::message::BodySegment;

    fn address(name: Option<&str>, addr: &str) -> Address {
        Address {
            name: name.map(str::to_string),
            address: Some(addr.to_string()),
        }
    }

    fn segment(mime_type: &str, body: &str) -> BodySegment {
        BodySegment {
            mime_type: mime_type.to_string(),
            body: body.as_bytes().to_vec(),
            size: body.len(),
            ..Default::default()
        }
    }

    #[test]
    fn escapes_markdown_special_characters() {
        assert_eq!(escape_markdown("a_b*c.d!"), "a\\_b\\*c\\.d\\!");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn quotes_every_line() {
        assert_eq!(quote_block("one\ntwo"), ">one\n>two");
    }

    #[test]
    fn renders_envelope_lines_and_quoted_body() {
        let message = Message {
            subject: Some("Invoice #42".to_string()),
            date: Some(chrono::Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap()),
            from: vec![address(Some("Alice"), "alice@example.com")],
            to: vec![address(None, "bob@example.com")],
            body: vec![segment("text/plain", "hello\nworld")],
            ..Default::default()
        };

        let rendered = render(&message, None);

        assert!(rendered.contains("*From*: [alice@example\\.com](mailto://alice@example.com)"));
        assert!(rendered.contains("*To*: [bob@example\\.com](mailto://bob@example.com)"));
        assert!(rendered.contains("*Subject*: Invoice \\#42"));
        assert!(rendered.contains("*Date*: Jul 01 2025 08:00:00"));
        assert!(rendered.ends_with(">hello\n>world"));
    }

    #[test]
    fn skips_empty_address_lists() {
        let message = Message {
            from: vec![address(None, "a@b.c")],
            body: vec![segment("text/plain", "x")],
            ..Default::default()
        };

        let rendered = render(&message, None);

        assert!(!rendered.contains("*To*"));
        assert!(!rendered.contains("*CC*"));
        assert!(!rendered.contains("*BCC*"));
    }

    #[test]
    fn prefers_html_body_over_plain_text() {
        let message = Message {
            body: vec![
                segment("text/plain", "plain version"),
                segment("text/html", "<p>html <b>version</b></p>"),
            ],
            ..Default::default()
        };

        let rendered = render(&message, None);

        assert!(rendered.contains("html"));
        assert!(rendered.contains("version"));
        assert!(!rendered.contains("plain version"));
    }

    #[test]
    fn template_substitutes_placeholders() {
        let message = Message {
            subject: Some("Invoice #42".to_string()),
            from: vec![address(None, "alice@example.com")],
            body: vec![segment("text/plain", "hello")],
            ..Default::default()
        };

        let rendered = render(
            &message,
            Some("{{subject}} sent by {{from}}\n\n{{body}}"),
        );

        assert_eq!(
            rendered,
            "Invoice \\#42 sent by [alice@example\\.com](mailto://alice@example.com)\n\n>hello"
        );
    }

    #[test]
    fn template_fields_absent_from_the_message_expand_to_nothing() {
        let message = Message {
            body: vec![segment("text/plain", "x")],
            ..Default::default()
        };

        assert_eq!(render(&message, Some("S:{{subject}} D:{{date}}")), "S: D:");
    }

    #[test]
    fn template_leaves_unknown_placeholders_verbatim() {
        let message = Message {
            subject: Some("hi".to_string()),
            ..Default::default()
        };

        assert_eq!(
            render(&message, Some("{{subject}} {{mystery}}")),
            "hi {{mystery}}"
        );
    }

    #[test]
    fn arbitrary_addresses_and_subjects_render_cleanly() {
        use fake::faker::company::en::CatchPhrase;
        use fake::faker::internet::en::SafeEmail;
        use fake::faker::name::en::Name;
        use fake::Fake;

        for _ in 0..32 {
            let email: String = SafeEmail().fake();
            let name: String = Name().fake();
            let message = Message {
                subject: Some(CatchPhrase().fake()),
                from: vec![address(Some(&name), &email)],
                body: vec![segment("text/plain", "body")],
                ..Default::default()
            };

            let rendered = render(&message, None);
            assert!(rendered.starts_with("*From*: ["));
            assert!(rendered.contains("*Subject*: "));
        }
    }

    #[test]
    fn missing_body_renders_placeholder() {
        let rendered = render(&Message::default(), None);
        assert_eq!(rendered, BODY_PLACEHOLDER);
    }

    #[test]
    fn chunks_split_on_char_boundaries() {
        assert_eq!(chunks("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(chunks("abcd", 4), vec!["abcd"]);
        assert_eq!(chunks("", 4), vec![""]);

        // 'é' is two bytes; a cut at byte 3 would split it
        let chunked = chunks("abé", 3);
        assert_eq!(chunked, vec!["ab", "é"]);
    }
}
