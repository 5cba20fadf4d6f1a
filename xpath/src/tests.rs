use super::*;
use html::{parse_document, NodeData};

/// Render matches as `tag`, `@name`, `"text"` for compact assertions
fn describe(doc: &Document, matches: &[Match]) -> Vec<String> {
    matches
        .iter()
        .map(|m| match m {
            Match::Attribute { name, .. } => format!("@{}", name),
            Match::Node(id) => match doc.data(*id) {
                NodeData::Element(e) => e.tag_name.clone(),
                NodeData::Text(t) => format!("{:?}", t),
                NodeData::Comment(c) => format!("<!--{}-->", c),
                NodeData::Doctype(_) => "doctype".to_string(),
                NodeData::Document => "/".to_string(),
            },
        })
        .collect()
}

fn run(markup: &str, selector: &str) -> Vec<String> {
    let doc = parse_document(markup).unwrap();
    let matches = select(&doc, selector).unwrap();
    describe(&doc, &matches)
}

const PAGE: &str = r#"<html><body><div class="ad" id="top"><span>x</span></div><p id="a" lang="en">one</p><p>two<!--note--></p><div class="content"><p id="b">three</p></div></body></html>"#;

#[test]
fn test_attribute_selection() {
    assert_eq!(run(PAGE, "//@id"), ["@id", "@id", "@id"]);
    assert_eq!(run(PAGE, "//p/@*"), ["@id", "@lang", "@id"]);
    assert_eq!(run(PAGE, "//p[@lang]/attribute::lang"), ["@lang"]);
}

#[test]
fn test_element_selection() {
    assert_eq!(run(PAGE, "//div[@class='ad']"), ["div"]);
    assert_eq!(run(PAGE, "//div[@class='ad']/span"), ["span"]);
    assert_eq!(run(PAGE, "/html/body/p"), ["p", "p"]);
    assert_eq!(run(PAGE, "//p"), ["p", "p", "p"]);
    assert_eq!(run(PAGE, "//body/*"), ["div", "p", "p", "div"]);
    assert_eq!(run(PAGE, "//DIV"), ["div", "div"]);
}

#[test]
fn test_positional_predicates() {
    assert_eq!(run(PAGE, "//body/p[1]"), ["p"]);
    assert_eq!(run(PAGE, "(//p)[last()]/@id"), ["@id"]);
    assert_eq!(run(PAGE, "//body/*[position() > 1 and position() < last()]"), ["p", "p"]);
    assert_eq!(run(PAGE, "//body/*[last() - 1]/text()"), [r#""two""#]);
}

#[test]
fn test_functions() {
    assert_eq!(run(PAGE, "//p[contains(., 'thr')]"), ["p"]);
    assert_eq!(run(PAGE, "//*[starts-with(@class, 'con')]"), ["div"]);
    assert_eq!(run(PAGE, "//p[not(@id)]"), ["p"]);
    assert_eq!(run(PAGE, "//div[count(span) = 1]"), ["div"]);
    assert_eq!(run(PAGE, "//*[name() = 'span']"), ["span"]);
    assert_eq!(run(PAGE, "//p[string-length(normalize-space()) = 3]"), ["p", "p"]);
    assert_eq!(run(PAGE, "//p[text() = 'one' or text() = 'two']"), ["p", "p"]);
    assert_eq!(run(PAGE, "//p[concat(@id, @lang) = 'aen']"), ["p"]);
}

#[test]
fn test_axes() {
    assert_eq!(run(PAGE, "//span/.."), ["div"]);
    assert_eq!(run(PAGE, "//span/ancestor::*"), ["html", "body", "div"]);
    assert_eq!(run(PAGE, "//span/ancestor::*[1]"), ["div"]);
    assert_eq!(run(PAGE, "//p[@id='a']/following-sibling::*"), ["p", "div"]);
    assert_eq!(run(PAGE, "//p[@id='a']/preceding-sibling::*[1]"), ["div"]);
    assert_eq!(run(PAGE, "//comment()"), ["<!--note-->"]);
    assert_eq!(run(PAGE, "//@lang/.."), ["p"]);
    assert_eq!(run(PAGE, "/"), ["/"]);
}

#[test]
fn test_union_is_in_document_order_without_duplicates() {
    assert_eq!(run(PAGE, "//span | //div | //div[1]"), ["div", "span", "div"]);
    assert_eq!(run(PAGE, "//p/@lang | //p"), ["p", "@lang", "p", "p"]);
}

#[test]
fn test_not_a_node_set() {
    let doc = parse_document(PAGE).unwrap();
    assert_eq!(select(&doc, "count(//p)"), Err(SelectorError::NotANodeSet));
    assert_eq!(select(&doc, "'x' | //p"), Err(SelectorError::NotANodeSet));
}

#[test]
fn test_selection_sees_removals() {
    let mut doc = parse_document(PAGE).unwrap();
    let selector = Selector::parse("//div[@class='ad']").unwrap();
    let ad = selector.select(&doc).unwrap();
    assert_eq!(ad.len(), 1);
    let Match::Node(id) = ad[0] else {
        panic!("expected an element")
    };
    assert!(doc.remove_node(id));
    assert!(selector.select(&doc).unwrap().is_empty());
    assert!(select(&doc, "//span").unwrap().is_empty());
}

#[test]
fn test_selector_keeps_its_source() {
    let selector = Selector::parse("//p/@lang | //span").unwrap();
    assert_eq!(selector.as_str(), "//p/@lang | //span");
    assert!(matches!(selector.expr(), Expr::Union(..)));

    let doc = parse_document(PAGE).unwrap();
    let shown: Vec<_> = selector
        .select(&doc)
        .unwrap()
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert_eq!(shown.len(), 2);
    assert!(shown[0].starts_with("node #"));
    assert!(shown[1].starts_with("@lang of node #"));
}
