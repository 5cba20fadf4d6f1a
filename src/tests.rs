use super::*;
use html::{parse_document, ParseError};
use std::cell::RefCell;
use xpath::SelectorError;

#[derive(Default)]
struct RecordingReporter(RefCell<Vec<(Side, NormalizeError)>>);

impl Reporter for RecordingReporter {
    fn report(&self, side: Side, error: &NormalizeError) {
        self.0.borrow_mut().push((side, error.clone()));
    }
}

impl RecordingReporter {
    fn sides(&self) -> Vec<Side> {
        self.0.borrow().iter().map(|(side, _)| *side).collect()
    }
}

fn comparator(before: &str, after: &str, selectors: &[&str]) -> XPathComparator<RecordingReporter> {
    selectors.iter().fold(
        XPathComparator::with_reporter(before, after, RecordingReporter::default()),
        |c, s| c.expression(*s),
    )
}

fn element_count(markup: &str) -> usize {
    let doc = parse_document(markup).unwrap();
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&id| doc.is_element(id))
        .count()
}

#[test]
fn test_ignored_attribute_makes_snapshots_equivalent() {
    let mut c = comparator(
        r#"<div id="1"><span>X</span></div>"#,
        r#"<div id="2"><span>X</span></div>"#,
        &["//@id"],
    );
    assert!(c.evaluate());
    assert_eq!(c.original_dom(), "<div><span>X</span></div>");
    assert_eq!(c.new_dom(), "<div><span>X</span></div>");
    assert!(c.reporter().sides().is_empty());
}

#[test]
fn test_structural_change_without_selectors() {
    let mut c = comparator("<a><b/></a>", "<a></a>", &[]);
    assert!(!c.evaluate());
    assert_eq!(c.original_dom(), "<a><b/></a>");
    assert_eq!(c.new_dom(), "<a/>");
    assert_eq!(c.verdict(), Verdict::NotEquivalent);
}

#[test]
fn test_everything_pruned_is_equivalent() {
    let mut c = comparator("<p>old</p>", "<p>new</p>", &["//p"]);
    assert!(c.evaluate());
    assert_eq!(c.original_dom(), "");
    assert_eq!(c.new_dom(), "");
    assert!(c.reporter().sides().is_empty());
}

#[test]
fn test_malformed_snapshot_falls_back_to_empty() {
    let mut c = comparator("<div><span>x</div>", "<div>x</div>", &[]);
    assert_eq!(c.verdict(), Verdict::Inconclusive);
    assert!(!c.evaluate());
    assert_eq!(c.original_dom(), "");
    assert_eq!(c.new_dom(), "<div>x</div>");

    let reports = c.reporter().0.borrow();
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|(side, e)| *side == Side::Before && matches!(e, NormalizeError::Parse(_))));
}

#[test]
fn test_overlapping_selectors_do_not_fail() {
    let selectors = ["//div[@class='ad']", "//div[@class='ad']/span"];
    let out = try_normalize(r#"<div class="ad"><span>x</span></div>"#, &selectors);
    assert_eq!(out, Ok(String::new()));
}

#[test]
fn test_both_failing_is_equivalent_but_inconclusive() {
    let mut c = comparator("<p>", "<q>", &[]);
    assert_eq!(c.verdict(), Verdict::Inconclusive);
    assert!(c.evaluate());
    assert_eq!(
        c.reporter().sides(),
        [Side::Before, Side::After, Side::Before, Side::After]
    );
}

#[test]
fn test_bad_selector_is_reported_with_the_selector() {
    let mut c = comparator("<p id='1'/>", "<p id='2'/>", &["//@id", "//p[bogus()]"]);
    assert!(c.evaluate());
    assert_eq!(c.verdict(), Verdict::Inconclusive);
    let reports = c.reporter().0.borrow();
    assert_eq!(
        reports[0],
        (
            Side::Before,
            NormalizeError::Prune(PruneError {
                selector: "//p[bogus()]".to_string(),
                source: SelectorError::UnknownFunction("bogus".to_string()),
            })
        )
    );
    assert_eq!(reports[1].0, Side::After);
}

#[test]
fn test_one_side_failing_leaves_the_other_alone() {
    let reporter = RecordingReporter::default();
    let before = normalize("<a><b></a>", &["//@x"], Side::Before, &reporter);
    let after = normalize(r#"<a x="1"><b/></a>"#, &["//@x"], Side::After, &reporter);
    assert_eq!(before, "");
    assert_eq!(after, "<a><b/></a>");
    assert_eq!(reporter.sides(), [Side::Before]);
    assert!(matches!(
        &reporter.0.borrow()[0].1,
        NormalizeError::Parse(ParseError::Malformed { offset: 6, .. })
    ));
}

#[test]
fn test_normalization_is_a_fixed_point() {
    let selectors = ["//@id", "//script", "//div[@class='ts']"];
    let inputs = [
        r#"<!DOCTYPE html><html><head><script>var t = 1;</script></head><body id=b><div class=ts>12:00</div><p>Hi <br> there</p></body></html>"#,
        r#"<ul><li id="1">a</li><li title='say "x"'>b</li></ul>"#,
    ];
    for input in inputs {
        let once = try_normalize(input, &selectors).unwrap();
        let twice = try_normalize(&once, &selectors).unwrap();
        assert_eq!(once, twice);
    }

    // Text on both sides of a removed element must read as one node on the first pass too
    let selectors = ["//b", "//p[text()='ac']"];
    let once = try_normalize("<p>a<b/>c</p>", &selectors).unwrap();
    assert_eq!(once, "");
    assert_eq!(try_normalize(&once, &selectors).unwrap(), once);

    let mut c = comparator(inputs[0], inputs[0], &selectors);
    assert!(c.evaluate());
    let stored = c.original_dom().to_string();
    assert!(c.evaluate());
    assert_eq!(c.original_dom(), stored);
}

#[test]
fn test_non_overlapping_selectors_commute() {
    let input = r#"<div id="1"><span class="x">a</span><p id="2">b</p></div>"#;
    let forward = try_normalize(input, &["//@id", "//span"]).unwrap();
    let backward = try_normalize(input, &["//span", "//@id"]).unwrap();
    assert_eq!(forward, backward);
    assert_eq!(forward, "<div><p>b</p></div>");
}

#[test]
fn test_pruning_is_subtractive() {
    let input = r##"<html><body><div class="ad"><a href="#">x</a></div><p id="p">t</p></body></html>"##;
    let original = parse_document(input).unwrap().node_count();
    for selectors in [
        vec!["//@*"],
        vec!["//div"],
        vec!["//a", "//div[@class='ad']"],
        vec!["//nothing"],
        vec!["//body/*[1] | //p/text()"],
    ] {
        let out = try_normalize(input, &selectors).unwrap();
        assert!(parse_document(&out).unwrap().node_count() <= original);
    }
}

#[test]
fn test_same_element_matched_twice() {
    let input = r#"<main><div class="ad" id="x">ad</div><p>body</p></main>"#;
    let both = try_normalize(input, &["//div[@class='ad']", "//div[@id='x']"]).unwrap();
    let first = try_normalize(input, &["//div[@class='ad']"]).unwrap();
    let second = try_normalize(input, &["//div[@id='x']"]).unwrap();
    assert_eq!(both, first);
    assert_eq!(both, second);
    assert_eq!(both, "<main><p>body</p></main>");
}

#[test]
fn test_removing_attributes_keeps_elements() {
    let input = r#"<div id="a"><p id="b">x</p><p>y</p></div>"#;
    let out = try_normalize(input, &["//@id"]).unwrap();
    assert_eq!(out, "<div><p>x</p><p>y</p></div>");
    assert_eq!(element_count(&out), element_count(input));
}

#[test]
fn test_comparator_trait_and_constructors() {
    let mut c = XPathComparator::with_expressions(["//@data-ts"]);
    c.add_expression("//span[@class='clock']");
    assert_eq!(c.expressions(), ["//@data-ts", "//span[@class='clock']"]);

    c.set_original_dom(r#"<p data-ts="1">a<span class="clock">1</span></p>"#.to_string());
    c.set_new_dom(r#"<p data-ts="2">a<span class="clock">2</span></p>"#.to_string());
    let strategy: &mut dyn Comparator = &mut c;
    assert!(strategy.is_equivalent());
    assert!(strategy.compare());
    assert_eq!(strategy.new_dom(), "<p>a</p>");

    let mut empty: XPathComparator = XPathComparator::default();
    assert!(empty.evaluate());
    assert_eq!(empty.verdict(), Verdict::Equivalent);
}

#[test]
fn test_reporter_shared_between_comparators() {
    let reporter = RecordingReporter::default();
    let mut first = XPathComparator::with_reporter("<a>", "<a/>", &reporter);
    let mut second = XPathComparator::with_reporter("<b/>", "<b>", &reporter).expression("//@x");
    assert!(!first.evaluate());
    assert!(!second.evaluate());
    assert_eq!(reporter.sides(), [Side::Before, Side::After]);
}

#[test]
fn test_deeply_nested_snapshots() {
    let depth = 20_000;
    let before = format!("{}<i id=\"1\"/>{}", "<div>".repeat(depth), "</div>".repeat(depth));
    let after = before.replace("id=\"1\"", "id=\"2\"");
    let mut c = comparator(&before, &after, &["//@id"]);
    assert!(c.evaluate());
    assert_eq!(
        c.new_dom(),
        format!("{}<i/>{}", "<div>".repeat(depth), "</div>".repeat(depth))
    );

    let unclosed = "<div>".repeat(depth);
    let mut c = comparator(&unclosed, &unclosed, &[]);
    assert_eq!(c.verdict(), Verdict::Inconclusive);
    assert!(c.evaluate());
}
