//! JavaScript snippets that evaluate XPath queries inside the page.
//!
//! Arguments are embedded as JSON string literals, so any XPath or value is
//! quoted safely.

fn literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn snapshot(xpath: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null)",
        literal(xpath)
    )
}

pub fn count(xpath: &str) -> String {
    format!("{}.snapshotLength", snapshot(xpath))
}

pub fn texts(xpath: &str) -> String {
    format!(
        r#"(() => {{
            const snap = {};
            const out = [];
            for (let i = 0; i < snap.snapshotLength; i++) {{
                const n = snap.snapshotItem(i);
                out.push((n.innerText ?? n.textContent ?? '').trim());
            }}
            return out;
        }})()"#,
        snapshot(xpath)
    )
}

/// Prefers the DOM property (absolute `href`) and falls back to the raw attribute.
pub fn attributes(xpath: &str, name: &str) -> String {
    format!(
        r#"(() => {{
            const snap = {};
            const name = {};
            const out = [];
            for (let i = 0; i < snap.snapshotLength; i++) {{
                const n = snap.snapshotItem(i);
                const v = (typeof n[name] === 'string') ? n[name] : n.getAttribute(name);
                if (v !== null && v !== undefined) out.push(String(v));
            }}
            return out;
        }})()"#,
        snapshot(xpath),
        literal(name)
    )
}

pub fn click(xpath: &str, index: usize) -> String {
    format!(
        r#"(() => {{
            const n = {}.snapshotItem({});
            if (!n) return false;
            n.scrollIntoView({{block: 'center'}});
            n.click();
            return true;
        }})()"#,
        snapshot(xpath),
        index
    )
}

pub fn fill(xpath: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const n = {}.snapshotItem(0);
            if (!n) return false;
            n.focus();
            n.value = {};
            n.dispatchEvent(new Event('input', {{bubbles: true}}));
            n.dispatchEvent(new Event('change', {{bubbles: true}}));
            return true;
        }})()"#,
        snapshot(xpath),
        literal(value)
    )
}
