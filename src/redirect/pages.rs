use std::fmt::Write;
use std::time::Duration;

use crate::composer::AuthoringState;
use crate::dashboard::{self, DashboardView};
use crate::html::{document, escape, is_web_link};

pub const REDIRECT_NOTICE: &str = "Redirecting you to your destination...";

/// Whole seconds for `<meta http-equiv="refresh">`, which has no sub-second precision
pub fn refresh_seconds(delay: Duration) -> u64 {
    delay.as_millis().div_ceil(1000) as u64
}

/// Neutral page shown while the browser waits to navigate to `destination`
pub fn render_notice(destination: &str, delay: Duration) -> String {
    let target = escape(destination);
    let head = format!(
        "<meta http-equiv=\"refresh\" content=\"{}; url={}\">\n<meta name=\"referrer\" content=\"no-referrer\">",
        refresh_seconds(delay),
        target
    );

    let mut body = format!(
        "<main aria-live=\"polite\" class=\"notice\">\n<p>{}</p>\n",
        escape(REDIRECT_NOTICE)
    );
    if is_web_link(destination) {
        let _ = writeln!(
            body,
            "<p class=\"fallback\"><a href=\"{target}\" rel=\"noreferrer\">Continue to {target}</a></p>"
        );
    }
    body.push_str("</main>");

    document("Redirecting", &head, &body)
}

/// Authoring form plus the visit history
pub fn render_authoring(state: &AuthoringState, view: &DashboardView) -> String {
    let mut body = String::from("<main class=\"container\">\n<h1>Trackly</h1>\n");

    let error = state.error.map(|e| e.to_string()).unwrap_or_default();
    let invalid = if state.error.is_some() { "true" } else { "false" };
    let disabled = if state.submit_enabled() {
        ""
    } else {
        " disabled aria-disabled=\"true\""
    };

    let _ = write!(
        body,
        r#"<form id="track-form" method="post" action="/links" novalidate>
  <label for="destination">Destination URL</label>
  <input id="destination" name="destination" type="url" placeholder="https://example.com/landing" value="{input}" aria-invalid="{invalid}" aria-describedby="destination-error" required>
  <p id="destination-error" class="error" role="alert">{error}</p>
  <button id="create-btn" type="submit"{disabled}>Create tracking link</button>
</form>
"#,
        input = escape(&state.input),
        error = escape(&error),
    );

    if let Some(link) = &state.link {
        let _ = write!(
            body,
            r#"<section id="link-result">
  <h2>Your tracking link</h2>
  <code id="tracking-link-output">{link}</code>
  <button id="copy-btn" type="button">Copy</button>
</section>
"#,
            link = escape(link.as_str()),
        );
    }

    body.push_str(&dashboard::render_html(view));
    body.push_str("</main>\n");
    body.push_str(AUTHORING_SCRIPT);

    document("Trackly", "", &body)
}

/// Live validation and clipboard copy; the server validates again on submit.
const AUTHORING_SCRIPT: &str = r#"<script>
(() => {
  const input = document.getElementById('destination');
  const button = document.getElementById('create-btn');
  const error = document.getElementById('destination-error');
  const check = () => {
    const value = input.value.trim();
    let message = '';
    if (!value) message = 'A destination URL is required.';
    else if (!/^https?:\/\/.+/.test(value)) message = 'The destination must start with http:// or https://';
    error.textContent = message;
    button.disabled = message !== '';
    button.toggleAttribute('aria-disabled', message !== '');
    input.setAttribute('aria-invalid', message !== '' && value !== '' ? 'true' : 'false');
  };
  input.addEventListener('input', check);
  const copy = document.getElementById('copy-btn');
  if (copy) {
    copy.addEventListener('click', () => {
      const text = document.getElementById('tracking-link-output').textContent;
      navigator.clipboard.writeText(text)
        .then(() => { copy.textContent = 'Copied!'; })
        .catch(() => { copy.textContent = 'Copy failed'; })
        .finally(() => setTimeout(() => { copy.textContent = 'Copy'; }, 1500));
    });
  }
})();
</script>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ValidationError;
    use url::Url;

    #[test]
    fn test_refresh_seconds_rounds_up() {
        assert_eq!(refresh_seconds(Duration::from_millis(0)), 0);
        assert_eq!(refresh_seconds(Duration::from_millis(800)), 1);
        assert_eq!(refresh_seconds(Duration::from_millis(1000)), 1);
        assert_eq!(refresh_seconds(Duration::from_millis(1001)), 2);
    }

    #[test]
    fn test_notice_navigates_to_destination() {
        let html = render_notice("https://example.com/?a=1&b=2", Duration::from_millis(800));
        assert!(html.contains(
            r#"<meta http-equiv="refresh" content="1; url=https://example.com/?a=1&amp;b=2">"#
        ));
        assert!(html.contains(REDIRECT_NOTICE));
        assert!(html.contains("class=\"fallback\""));
    }

    #[test]
    fn test_notice_does_not_link_unsafe_schemes() {
        let html = render_notice("javascript:alert(\"x\")", Duration::from_millis(800));
        assert!(!html.contains("class=\"fallback\""));
        assert!(html.contains("url=javascript:alert(&quot;x&quot;)"));
    }

    #[test]
    fn test_authoring_page_disables_submit_on_error() {
        let state = AuthoringState {
            input: "ftp://x".to_string(),
            error: Some(ValidationError::InvalidScheme),
            link: None,
        };
        let html = render_authoring(&state, &DashboardView::Empty);
        assert!(html.contains("<button id=\"create-btn\" type=\"submit\" disabled"));
        assert!(html.contains("The destination must start with http:// or https://"));
        assert!(html.contains("value=\"ftp://x\""));
        assert!(html.contains(crate::dashboard::render::EMPTY_NOTICE));
    }

    #[test]
    fn test_authoring_page_shows_link() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        let state = AuthoringState::submit(&base, "https://example.com");
        let html = render_authoring(&state, &DashboardView::Empty);
        assert!(html.contains("http://localhost:8080/?url=https%3A%2F%2Fexample.com"));
        assert!(html.contains("id=\"copy-btn\""));
    }
}
