use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};

/// Tags that never carry article text.
const NON_CONTENT_TAGS: &[&str] = &[
    "head", "script", "style", "iframe", "object", "embed", "param", "meta", "link", "noscript",
];

/// Visual media, dropped together with any caption they wrap.
const MEDIA_TAGS: &[&str] = &[
    "img", "figure", "picture", "canvas", "svg", "video", "audio", "source", "track",
];

/// Elements whose class or id contains one of these are treated as clutter.
const CLUTTER_KEYWORDS: &[&str] = &[
    "ad",
    "advertisement",
    "banner",
    "footer",
    "sidebar",
    "nav",
    "menu",
    "related",
    "social",
    "share",
];

static WRAPPED_IMAGE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\s*`https?://[^`]+`").expect("valid regex"));
static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\s*\(https?://[^)]+\)").expect("valid regex"));
static IMAGE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:图片|image|img|photo|picture)\s*\]").expect("valid regex")
});
static BACKTICK_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`\s*https?://[^`\s]+\s*`").expect("valid regex"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

/// Convert article HTML into cleaned ATX-style markdown.
///
/// Non-content tags, media and class/id clutter are dropped and anchors
/// unwrapped while walking the DOM, so the markdown never contains link
/// or image syntax; the text pass only has to deal with what the source
/// text itself carried.
pub fn html_to_markdown(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let document = Html::parse_document(html);
    let mut writer = MarkdownWriter::default();
    writer.children(document.root_element());

    clean_text(&writer.finish())
}

/// Remove image placeholders and URLs, trim lines and collapse blank lines.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = WRAPPED_IMAGE_URL.replace_all(text, "");
    let text = MARKDOWN_IMAGE.replace_all(&text, "");
    let text = IMAGE_PLACEHOLDER.replace_all(&text, "");
    let text = BACKTICK_URL.replace_all(&text, "");
    let text = BARE_URL.replace_all(&text, "");

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_clutter(element: &Element) -> bool {
    let name = element.name();
    if NON_CONTENT_TAGS.contains(&name) || MEDIA_TAGS.contains(&name) {
        return true;
    }

    // The document root is never clutter, whatever its class says
    if name == "html" || name == "body" {
        return false;
    }

    [element.attr("class"), element.id()]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|value| CLUTTER_KEYWORDS.iter().any(|k| value.contains(k)))
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Unordered,
    Ordered(usize),
}

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    lists: Vec<ListKind>,
}

impl MarkdownWriter {
    fn finish(self) -> String {
        self.out
    }

    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    /// Render an element's children on their own, keeping list nesting.
    fn capture(&self, element: ElementRef<'_>) -> String {
        let mut inner = MarkdownWriter {
            out: String::new(),
            lists: self.lists.clone(),
        };
        inner.children(element);
        inner.out.trim().to_string()
    }

    fn element(&mut self, el: ElementRef<'_>) {
        if is_clutter(el.value()) {
            return;
        }

        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = one_line(&self.capture(el));
                if !text.is_empty() {
                    self.block_break();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.block_break();
                }
            }
            "p" | "div" | "section" | "article" | "main" | "header" | "aside" | "table" | "tr"
            | "dl" | "dt" | "dd" | "address" | "details" | "summary" => {
                self.block_break();
                self.children(el);
                self.block_break();
            }
            "ul" | "ol" => {
                self.lists.push(if name == "ol" {
                    ListKind::Ordered(0)
                } else {
                    ListKind::Unordered
                });
                self.block_break();
                self.children(el);
                self.lists.pop();
                self.block_break();
            }
            "li" => self.list_item(el),
            "blockquote" => {
                let quoted = self.capture(el);
                if !quoted.is_empty() {
                    self.block_break();
                    let lines: Vec<String> = quoted
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| format!("> {}", l.trim()))
                        .collect();
                    self.out.push_str(&lines.join("\n"));
                    self.block_break();
                }
            }
            "pre" => {
                let code: String = el.text().collect();
                let code = code.trim_matches('\n');
                if !code.trim().is_empty() {
                    self.block_break();
                    self.out.push_str("```\n");
                    self.out.push_str(code);
                    self.out.push_str("\n```");
                    self.block_break();
                }
            }
            "code" => self.wrap_inline(el, "`"),
            "strong" | "b" => self.wrap_inline(el, "**"),
            "em" | "i" => self.wrap_inline(el, "*"),
            "br" => {
                self.trim_trailing_spaces();
                self.out.push('\n');
            }
            "hr" => {
                self.block_break();
                self.out.push_str("---");
                self.block_break();
            }
            "td" | "th" => {
                self.children(el);
                self.out.push(' ');
            }
            // Anchors, spans and anything unknown keep only their text
            _ => self.children(el),
        }
    }

    fn list_item(&mut self, el: ElementRef<'_>) {
        let depth = self.lists.len().max(1);
        let marker = match self.lists.last_mut() {
            Some(ListKind::Ordered(n)) => {
                *n += 1;
                format!("{}. ", n)
            }
            _ => "- ".to_string(),
        };

        self.line_break();
        self.out.push_str(&"  ".repeat(depth - 1));
        self.out.push_str(&marker);
        self.children(el);
        self.line_break();
    }

    fn wrap_inline(&mut self, el: ElementRef<'_>, marker: &str) {
        let inner = one_line(&self.capture(el));
        if inner.is_empty() {
            return;
        }
        self.out.push_str(marker);
        self.out.push_str(&inner);
        self.out.push_str(marker);
    }

    fn text(&mut self, text: &str) {
        let mut collapsed = String::with_capacity(text.len());
        let mut last_space = false;
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    collapsed.push(' ');
                }
                last_space = true;
            } else {
                collapsed.push(c);
                last_space = false;
            }
        }

        if self.out.is_empty() || self.out.ends_with([' ', '\n']) {
            self.out.push_str(collapsed.trim_start());
        } else {
            self.out.push_str(&collapsed);
        }
    }

    fn trim_trailing_spaces(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
    }

    fn line_break(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn block_break(&mut self) {
        self.trim_trailing_spaces();
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_images_links_ads_and_urls() {
        let html = r#"
            <article>
              <p>Intro <img src="https://cdn.example.com/pic.png" alt="pic"> with a
              <a href="http://x">text</a> and a bare https://tracking.example.com/a?b=c link.</p>
              <div class="ad-banner">Buy cheap stuff now</div>
            </article>"#;

        let md = html_to_markdown(html);

        assert!(md.contains("text"), "{md}");
        assert!(md.contains("Intro"));
        assert!(!md.contains("href"));
        assert!(!md.contains("]("));
        assert!(!md.contains("!["));
        assert!(!md.contains("Buy cheap stuff"));
        assert!(!md.contains("http"));
    }

    #[test]
    fn converts_structure_to_atx_markdown() {
        let html = r#"
            <h1>Main  heading</h1>
            <p>First <strong>bold</strong> and <em>soft</em> words.</p>
            <h3>Sub</h3>
            <ul><li>one</li><li>two</li></ul>
            <ol><li>alpha</li><li>beta</li></ol>
            <blockquote><p>quoted line</p></blockquote>
            <pre><code>let x = 1;</code></pre>
            <p>Call <code>run()</code> first.</p>"#;

        let md = html_to_markdown(html);

        assert!(md.contains("# Main heading"), "{md}");
        assert!(md.contains("### Sub"));
        assert!(md.contains("First **bold** and *soft* words."));
        assert!(md.contains("- one"));
        assert!(md.contains("- two"));
        assert!(md.contains("1. alpha"));
        assert!(md.contains("2. beta"));
        assert!(md.contains("> quoted line"));
        assert!(md.contains("let x = 1;"));
        assert!(md.contains("```"));
        assert!(md.contains("`run()`"));
    }

    #[test]
    fn drops_non_content_tags_and_clutter_by_id() {
        let html = r#"
            <html><head><title>Page title</title><style>p { color: red }</style></head>
            <body>
              <nav class="top-nav">Home | About</nav>
              <div id="main-menu">Menu entries</div>
              <script>alert("hi")</script>
              <p>Real body text.</p>
              <figure><img src="a.png"><figcaption>Caption</figcaption></figure>
              <div class="site-footer">Copyright</div>
            </body></html>"#;

        let md = html_to_markdown(html);

        assert_eq!(md, "Real body text.");
    }

    #[test]
    fn clean_text_removes_placeholders_and_collapses_lines() {
        let text = "First line   \n\n\n![photo](https://img.example.com/a.jpg)\n[image]\n! `https://img.example.com/b.jpg`\nsee `https://example.com/x`\n   last line";

        assert_eq!(clean_text(text), "First line\n\nsee\n\nlast line");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(html_to_markdown("   "), "");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn plain_text_content_survives() {
        assert_eq!(html_to_markdown("Just some words"), "Just some words");
    }
}
