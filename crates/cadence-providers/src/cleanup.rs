// SPDX-License-Identifier: GPL-3.0-or-later
//! Text normalization applied to provider responses before caching, ported
//! from the search-term and lyrics-body cleanup rules providers apply
//! ahead of fuzzy matching.

use regex::Regex;
use std::sync::OnceLock;

fn section_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[(verse|chorus|bridge|intro|outro|hook|pre-chorus|refrain)[^\]]*\]").unwrap())
}

fn embed_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\d*Embed\s*$").unwrap())
}

fn lrc_timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d{2}:\d{2}\.\d{2,3}\]").unwrap())
}

/// Any single trailing `(...)` or `[...]` group — general parenthetical and
/// bracketed suffix stripping (§4.2), applied repeatedly so chained
/// suffixes like `"(feat. X) (Remastered)"` are fully removed.
fn trailing_bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*[\(\[][^\(\)\[\]]*[\)\]]\s*$").unwrap())
}

/// An unbracketed trailing `feat./featuring/ft.` clause (§4.2).
fn feat_clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*(feat\.?|featuring|ft\.?)\s+.*$").unwrap())
}

/// An unbracketed trailing `- Remaster/Remix/Live/Acoustic/Demo` tail (§4.2).
fn dash_tail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*-\s*(remaster(ed)?|remix(ed)?|live|acoustic|demo)[^-]*$").unwrap())
}

fn you_might_also_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)you might also like.*$").unwrap())
}

/// Normalize a title/artist pair before sending it to a provider (§4.2):
/// repeatedly strip trailing parenthetical/bracketed suffixes (this also
/// catches bracketed `feat.`/remaster annotations), then an unbracketed
/// `feat.` clause, then an unbracketed `- Remaster/Remix/Live/Acoustic/Demo`
/// tail, then collapse whitespace. This is the aggressive strip used only
/// for provider search terms — the cache key uses plain lowercase-trim.
pub fn clean_search_term(term: &str) -> String {
    let mut stripped = term.to_string();
    loop {
        let next = trailing_bracket_re().replace(&stripped, "").into_owned();
        if next == stripped {
            break;
        }
        stripped = next;
    }
    let without_feat = feat_clause_re().replace(&stripped, "").into_owned();
    let without_dash_tail = dash_tail_re().replace(&without_feat, "");
    without_dash_tail.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip bracketed section markers, Genius's trailing `Embed` counter and
/// its "...you might also like" related-songs trailer from scraped lyrics
/// HTML text. Genius-only: its page scrape carries this cruft because the
/// source is a rendered song page, not a lyrics API, so only
/// `GeniusProvider` calls this. LRCLib and lyrics.ovh return the lyrics body
/// directly and only need whitespace normalization — see
/// `clean_lyrics_whitespace`.
pub fn clean_lyrics(body: &str) -> String {
    let without_trailer = you_might_also_like_re().replace(body, "");
    let without_markers = section_marker_re().replace_all(&without_trailer, "");
    let without_embed = embed_suffix_re().replace(without_markers.trim_end(), "");
    without_embed.trim().to_string()
}

/// Whitespace/paragraph normalization only, for providers (LRCLib,
/// lyrics.ovh) whose lyrics text doesn't carry Genius's page-scrape cruft:
/// trims each line, collapses runs of 3+ blank lines to a single blank
/// line, and trims the result.
pub fn clean_lyrics_whitespace(body: &str) -> String {
    let trimmed_lines: Vec<&str> = body.lines().map(str::trim_end).collect();
    let collapsed = trimmed_lines.join("\n");
    let mut normalized = String::with_capacity(collapsed.len());
    let mut blank_run = 0;
    for line in collapsed.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        normalized.push_str(line);
        normalized.push('\n');
    }
    normalized.trim().to_string()
}

/// Strip LRC timestamp tags `[mm:ss.xx]` while leaving the rest of a synced
/// lyrics document untouched.
pub fn clean_synced_lyrics(body: &str) -> String {
    lrc_timestamp_re().replace_all(body, "").to_string()
}

pub fn clean_title(title: &str) -> String {
    clean_search_term(title)
}

pub fn clean_artist(artist: &str) -> String {
    clean_search_term(artist)
}
