use std::fmt::Write;

use super::{DashboardView, DestinationGroup};
use crate::html::{escape, is_web_link};

pub const EMPTY_NOTICE: &str = "No visits recorded yet.";

/// HTML fragment for the visit history section
pub fn render_html(view: &DashboardView) -> String {
    let mut out = String::from("<section class=\"visits\" aria-labelledby=\"visits-title\">\n");
    out.push_str("<h2 id=\"visits-title\">Visit history</h2>\n");

    match view {
        DashboardView::Empty => {
            let _ = writeln!(out, "<p class=\"empty\">{}</p>", escape(EMPTY_NOTICE));
        }
        DashboardView::Groups(groups) => {
            for group in groups {
                render_group_html(&mut out, group);
            }
        }
    }

    out.push_str("</section>\n");
    out
}

fn render_group_html(out: &mut String, group: &DestinationGroup) {
    let destination = escape(&group.destination);
    let target = if is_web_link(&group.destination) {
        format!(
            "<a href=\"{destination}\" target=\"_blank\" rel=\"noopener noreferrer\">{destination}</a>"
        )
    } else {
        destination
    };

    for visit in &group.visits {
        let _ = write!(
            out,
            r#"<div class="visit-entry" tabindex="0">
  <div><strong>Destination:</strong> {target}</div>
  <div><strong>IP:</strong> {ip}</div>
  <div><strong>Location:</strong> {city}, {region}, {country}</div>
  <div><strong>Time:</strong> {time}</div>
</div>
"#,
            ip = escape(&visit.ip),
            city = escape(&visit.city),
            region = escape(&visit.region),
            country = escape(&visit.country),
            time = escape(&visit.visited_at),
        );
    }
}

/// Plain-text rendering for the terminal
pub fn render_text(view: &DashboardView) -> String {
    let mut out = String::new();

    match view {
        DashboardView::Empty => {
            out.push_str(EMPTY_NOTICE);
            out.push('\n');
        }
        DashboardView::Groups(groups) => {
            for group in groups {
                let _ = writeln!(out, "{} ({} visits)", group.destination, group.visits.len());
                for visit in &group.visits {
                    let _ = writeln!(
                        out,
                        "  {:<23} {:<39} {}, {}, {}",
                        visit.visited_at, visit.ip, visit.city, visit.region, visit.country
                    );
                }
            }
        }
    }

    out
}
