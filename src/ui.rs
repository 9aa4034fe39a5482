use crate::leaderboard::rank_label;
use crate::models::LeaderboardEntry;

pub fn render_scoreboard(total: u64, entries: &[LeaderboardEntry]) -> String {
    let rows = if entries.is_empty() {
        r#"<li class="empty">No taps yet. Be the first.</li>"#.to_string()
    } else {
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                format!(
                    r#"<li><span class="rank">{}</span><span class="country">{} {}</span><span class="taps">{}</span></li>"#,
                    rank_label(index),
                    entry.country_code.flag(),
                    escape(&entry.display_name),
                    group_digits(entry.taps),
                )
            })
            .collect::<Vec<_>>()
            .join("\n        ")
    };

    SCOREBOARD_HTML
        .replace("{{TOTAL}}", &group_digits(total))
        .replace("{{ROWS}}", &rows)
}

fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const SCOREBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <meta http-equiv="refresh" content="5" />
  <title>Tap Counter</title>
  <style>
    :root {
      --bg-1: #dbeafe;
      --bg-2: #93c5fd;
      --ink: #1e293b;
      --accent: #2563eb;
      --card: rgba(255, 255, 255, 0.88);
      --shadow: 0 24px 60px rgba(30, 41, 59, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(180deg, var(--bg-1), var(--bg-2));
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(560px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    .total {
      text-align: center;
    }

    .total .label {
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #64748b;
    }

    .total .value {
      font-size: clamp(2.4rem, 8vw, 3.6rem);
      font-weight: 800;
      color: var(--accent);
    }

    ol {
      list-style: none;
      margin: 0;
      padding: 0;
      display: grid;
      gap: 6px;
    }

    li {
      display: grid;
      grid-template-columns: 3rem 1fr auto;
      align-items: center;
      padding: 10px 14px;
      border-radius: 14px;
      background: white;
    }

    li.empty {
      display: block;
      text-align: center;
      color: #64748b;
    }

    .taps {
      font-weight: 700;
      color: var(--accent);
    }
  </style>
</head>
<body>
  <main class="app">
    <section class="total">
      <div class="label">Total Taps</div>
      <div id="total" class="value">{{TOTAL}}</div>
    </section>
    <section>
      <h2>Country Leaderboard</h2>
      <ol id="leaderboard">
        {{ROWS}}
      </ol>
    </section>
  </main>
</body>
</html>
"#;
