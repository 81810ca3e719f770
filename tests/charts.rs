//! End-to-end: one realistic payload per legacy format, parsed through the
//! public entry points, asserting the canonical model hides which format
//! (and which physical titer encoding) the data came from.

use pretty_assertions::assert_eq;

use serochart::{
    detect_format, merge_layers, parse, parse_auto, verify_merged, ChartError, Format,
    MinimumColumnBasis, Titer, TiterMerger,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Same 2×2 table in all three formats: ACE dense, ACD1 sparse, LISPMDS.
const ACE: &str = r#"{
 "_": "-*- js-indent-level: 1 -*-",
 "  version": "acmacs-ace-v1",
 "c": {
  "i": {"v": "INFLUENZA", "V": "A(H3N2)", "A": "HI", "D": "2016-04-12", "l": "CDC"},
  "a": [{"N": "A/ANTIGEN/1/2014", "D": "2014-03-01", "P": "MDCK2", "l": ["CDC#2014-00123"]},
        {"N": "A/ANTIGEN/2/2015", "P": "E4", "a": ["NEW"]}],
  "s": [{"N": "A/SERUM/1/2014", "I": "F123", "s": "FERRET", "h": [0]},
        {"N": "A/SERUM/2/2015", "I": "F456", "s": "FERRET"}],
  "t": {"l": [["40", "<10"], ["1280", "*"]]},
  "P": [{"c": "relax-2d", "s": 12.5, "l": [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]]}],
  "p": {"d": [0, 1, 2, 3]}
 }
}"#;

const ACD1: &str = "# acmacs chart dump\n\
data = {'version': 4,\n\
 'chart': {\n\
  'info': {'virus': 'INFLUENZA', 'virus_type': 'A(H3N2)', 'assay': 'HI',\n\
           'date': '2016-04-12', 'lab': 'CDC'},\n\
  'antigens': [{'name': 'A/ANTIGEN/1/2014', 'date': '2014-03-01', 'passage': 'MDCK2'},\n\
               {'name': 'A/ANTIGEN/2/2015', 'passage': 'E4'}],\n\
  'sera': [{'name': 'A/SERUM/1/2014', 'serum_id': 'F123', 'homologous': [0]},\n\
           {'name': 'A/SERUM/2/2015', 'serum_id': 'F456'}],\n\
  'titers': {'titers_list_of_dict': [{0: '40', 1: '<10'}, {0: '1280'}]},\n\
 },\n\
}\n";

const LISPMDS: &str = "\
;; exported table
(MAKE-MASTER-MDS-WINDOW
 :HI-IN '((A/ANTIGEN/1/2014 A/ANTIGEN/2/2015)
          (A/SERUM/1/2014 A/SERUM/2/2015)
          ((40 <10)
           (1280 *))
          CDC-2016-04-12)
 :MDS-DIMENSIONS 2)";

#[test]
fn detection_is_unambiguous() {
    init_logging();
    assert_eq!(detect_format(ACE), Format::Ace);
    assert_eq!(detect_format(ACD1), Format::Acd1);
    assert_eq!(detect_format(LISPMDS), Format::Lispmds);
    assert_eq!(detect_format("random text"), Format::Unknown);
}

#[test]
fn all_formats_yield_the_same_matrix() {
    init_logging();
    let charts = [
        parse(ACE, Format::Ace).unwrap(),
        parse(ACD1, Format::Acd1).unwrap(),
        parse_auto(LISPMDS).unwrap(),
    ];
    for chart in &charts {
        assert_eq!(chart.number_of_antigens(), 2);
        assert_eq!(chart.number_of_sera(), 2);
        assert_eq!(chart.titers().number_of_non_dont_cares(), 3);
        assert_eq!(chart.titers().titer(0, 0).unwrap(), Titer::new("40"));
        assert_eq!(chart.titers().titer(0, 1).unwrap(), Titer::new("<10"));
        assert_eq!(chart.titers().titer(1, 0).unwrap(), Titer::new("1280"));
        assert_eq!(chart.titers().titer(1, 1).unwrap(), Titer::DontCare);
    }
    // name metadata survives whichever key naming the format used
    assert_eq!(charts[0].antigens()[0].name, charts[1].antigens()[0].name);
    assert_eq!(charts[0].antigens()[0].name, charts[2].antigens()[0].name);
    assert_eq!(charts[0].sera()[0].homologous, vec![0]);
    assert_eq!(charts[1].sera()[0].homologous, vec![0]);
}

#[test]
fn column_bases_agree_across_encodings() {
    init_logging();
    let ace = parse(ACE, Format::Ace).unwrap();
    let acd1 = parse(ACD1, Format::Acd1).unwrap();
    for chart in [&ace, &acd1] {
        let bases = chart.column_bases(MinimumColumnBasis::none()).unwrap();
        assert_eq!(bases.size(), 2);
        assert_eq!(bases.column_basis(0), 7.0); // 1280
        assert_eq!(bases.column_basis(1), 0.0); // <10
    }
    // cached instance is reused per floor
    let first = ace.column_bases(MinimumColumnBasis::none()).unwrap();
    let again = ace.column_bases(MinimumColumnBasis::none()).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &again));
}

#[test]
fn ace_projections_pass_through() {
    init_logging();
    let chart = parse(ACE, Format::Ace).unwrap();
    assert_eq!(chart.projections().len(), 1);
    assert_eq!(chart.projections()[0].stress, Some(12.5));
    assert_eq!(chart.projections()[0].comment.as_deref(), Some("relax-2d"));
    assert!(chart.plot_spec().is_some());
    assert_eq!(chart.info().make_name(), "CDC A(H3N2) HI 2016-04-12");
}

#[test]
fn layered_ace_chart_supports_the_merge_audit() {
    init_logging();
    let text = r#"{
     "  version": "acmacs-ace-v1",
     "c": {
      "i": {"l": "CDC", "S": [{"D": "2016-02-01", "l": "CDC"},
                              {"D": "2016-03-01", "l": "CDC"}]},
      "a": [{"N": "AG/1"}],
      "s": [{"N": "SR/1"}, {"N": "SR/2"}],
      "t": {"l": [["57", "<10"]],
            "L": [[{"0": "40", "1": "<10"}], [{"0": "80"}]]}
     }
    }"#;
    let chart = parse_auto(text).unwrap();
    let titers = chart.titers();
    assert_eq!(titers.number_of_layers(), 2);
    assert_eq!(titers.titer_of_layer(0, 0, 0).unwrap(), Titer::new("40"));
    assert_eq!(titers.titer_of_layer(1, 0, 1).unwrap(), Titer::DontCare);
    assert_eq!(chart.info().sources.len(), 2);
    assert_eq!(chart.info().make_name(), "CDC 2016-02-01-2016-03-01");

    // merged values match what merge_layers recomputes
    assert_eq!(
        merge_layers(&[Titer::new("40"), Titer::new("80")]).unwrap(),
        Titer::new("57")
    );
    let warnings = verify_merged(titers, &TiterMerger::default()).unwrap();
    assert_eq!(warnings, Vec::<String>::new());
}

#[test]
fn forced_column_bases_take_precedence() {
    init_logging();
    let text = r#"{
     "  version": "acmacs-ace-v1",
     "c": {
      "a": [{"N": "AG/1"}],
      "s": [{"N": "SR/1"}, {"N": "SR/2"}],
      "t": {"l": [["40", "80"]]},
      "C": [7.0, 8.0]
     }
    }"#;
    let chart = parse_auto(text).unwrap();
    for floor in [MinimumColumnBasis::none(), MinimumColumnBasis::from_titer(2560)] {
        let bases = chart.column_bases(floor).unwrap();
        assert_eq!(bases.as_slice(), &[7.0, 8.0]);
    }
}

#[test]
fn acd1_stray_backslash_is_collected_not_fatal() {
    init_logging();
    let text = ACD1.replace("A/SERUM/2/2015", r"A/SERUM\2\2015");
    let chart = parse_auto(&text).unwrap();
    assert_eq!(chart.warnings().len(), 2);
    assert!(chart.warnings()[0].contains("backslash"));
}

#[test]
fn validation_failures_never_yield_a_chart() {
    init_logging();
    // titer row count does not match the antigen count
    let text = r#"{
     "  version": "acmacs-ace-v1",
     "c": {
      "a": [{"N": "AG/1"}, {"N": "AG/2"}],
      "s": [{"N": "SR/1"}],
      "t": {"l": [["40"]]}
     }
    }"#;
    match parse_auto(text) {
        Err(ChartError::Validation(msg)) => assert!(msg.contains("antigen count"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }

    // sparse matrix spanning more sera than listed
    let text = r#"{
     "  version": "acmacs-ace-v1",
     "c": {
      "a": [{"N": "AG/1"}],
      "s": [{"N": "SR/1"}],
      "t": {"d": [{"0": "40", "5": "80"}]}
     }
    }"#;
    assert!(matches!(parse_auto(text), Err(ChartError::Validation(_))));
}
