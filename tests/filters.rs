use serde_json::{json, Value};

use jsonpathx::{
    query, EvalError, EvalPolicy, FilterMode, QueryError, QueryOptions, Sandbox,
};
#[cfg(feature = "trace")]
use test_log::test;

fn readings() -> Value {
    json!({
        "threshold": 40,
        "readings": [
            {"val": 35, "msg": "foo"},
            {"val": 40, "msg": "bar"},
            {"val": 42, "msg": "biz"},
            {"val": 48, "msg": "bop"},
        ]
    })
}

mod rfc {
    use super::*;

    #[test]
    fn relative_and_absolute_queries() {
        let value = readings();
        let result = query(
            "$.readings[?@.val > $.threshold].msg",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        assert_eq!(result.values(), vec!["biz", "bop"]);
    }

    #[test]
    fn logical_operators() {
        let value = json!({"foo": [1, 2, 3, 4, 5]});
        let result = query("$.foo[?@ > 2 && @ < 5]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.values(), vec![3, 4]);
        let result = query("$.foo[?@ == 1 || @ == 5]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.values(), vec![1, 5]);
        let result = query("$.foo[?!(@ < 4)]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.values(), vec![4, 5]);
    }

    #[test]
    fn existence_tests() {
        let value = json!({"rows": [{"id": 1}, {"other": 2}, {"id": null}]});
        let result = query("$.rows[?@.id]", &value, &QueryOptions::new()).unwrap();
        // existence, not truthiness: a null id still exists
        assert_eq!(
            result.values(),
            vec![json!({"id": 1}), json!({"id": null})]
        );
    }

    #[test]
    fn comparisons_across_types_are_false() {
        let value = json!({"rows": [{"v": 1}, {"v": "1"}, {"v": null}]});
        let result = query("$.rows[?@.v == 1]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.len(), 1);
        let result = query("$.rows[?@.v < 2]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.len(), 1);
        // null equals only null
        let result = query("$.rows[?@.v == null]", &value, &QueryOptions::new()).unwrap();
        assert_eq!(result.values(), vec![json!({"v": null})]);
    }

    #[test]
    fn missing_nodes_compare_equal_to_missing() {
        let value = json!({"rows": [{"a": 1}, {"b": 2}]});
        let result = query("$.rows[?@.a == @.c]", &value, &QueryOptions::new()).unwrap();
        // in the second row both sides are nothing
        assert_eq!(result.values(), vec![json!({"b": 2})]);
    }

    #[test]
    fn scalar_parents_yield_nothing() {
        let value = json!({"x": 42});
        let result = query("$.x[?@ > 0]", &value, &QueryOptions::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn count_and_value_functions() {
        let value = json!({"rows": [
            {"tags": ["a", "b"]},
            {"tags": ["a"]},
            {"tags": []}
        ]});
        let result = query(
            "$.rows[?count(@.tags[*]) == 2]",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        let result = query(
            "$.rows[?value(@.tags[*]) == 'a']",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        // only the single-element nodelist converts to a value
        assert_eq!(result.values(), vec![json!({"tags": ["a"]})]);
    }

    #[test]
    fn match_and_search_functions() {
        let value = json!({"rows": [
            {"date": "1974-05-11"},
            {"date": "1974-06-11"},
            {"date": "x1974-05-11y"}
        ]});
        let result = query(
            "$.rows[?match(@.date, '1974-05-..')]",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        let result = query(
            "$.rows[?search(@.date, '1974-05')]",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn nested_filters() {
        let value = json!({"rows": [
            {"children": [{"ok": true}]},
            {"children": [{"ok": false}]}
        ]});
        let result = query(
            "$.rows[?@.children[?@.ok == true]]",
            &value,
            &QueryOptions::new(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn malformed_filters_error_lazily() {
        let value = json!({"rows": []});
        let err = query("$.rows[?@ ==]", &value, &QueryOptions::new()).unwrap_err();
        assert!(matches!(err, QueryError::Eval(EvalError::FilterParse(_))));
    }
}

mod legacy {
    use super::*;

    fn native<'a>() -> QueryOptions<'a> {
        QueryOptions::new()
            .with_filter_mode(FilterMode::JsonPath)
            .with_eval(EvalPolicy::Native)
    }

    #[test]
    fn expression_filters() {
        let value = readings();
        let result = query("$.readings[?(@.val >= 40)].msg", &value, &native()).unwrap();
        assert_eq!(result.values(), vec!["bar", "biz", "bop"]);
        let result = query(
            "$.readings[?(@.val > 36 && @.msg == 'bop')]",
            &value,
            &native(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn builtin_variables() {
        let value = readings();
        let result = query("$.readings[?(@property == 2)].msg", &value, &native()).unwrap();
        assert_eq!(result.values(), vec!["biz"]);
        let result = query(
            "$.readings[?(@.val > @root.threshold)].msg",
            &value,
            &native(),
        )
        .unwrap();
        assert_eq!(result.values(), vec!["biz", "bop"]);
        let result = query(
            "$.readings[?(@path == \"$['readings'][0]\")].msg",
            &value,
            &native(),
        )
        .unwrap();
        assert_eq!(result.values(), vec!["foo"]);
    }

    #[test]
    fn sandbox_names() {
        let value = readings();
        let mut sandbox = Sandbox::new();
        sandbox.insert(String::from("cutoff"), json!(41));
        let opts = native().with_sandbox(sandbox.clone());
        let result = query("$.readings[?(@.val > cutoff)].msg", &value, &opts).unwrap();
        assert_eq!(result.values(), vec!["biz", "bop"]);
        // the safe policy accepts sandbox names too
        let opts = QueryOptions::new()
            .with_filter_mode(FilterMode::JsonPath)
            .with_eval(EvalPolicy::Safe)
            .with_sandbox(sandbox);
        let result = query("$.readings[?(@.val > cutoff)].msg", &value, &opts).unwrap();
        assert_eq!(result.values(), vec!["biz", "bop"]);
    }

    #[test]
    fn safe_policy_rejects_unknown_identifiers() {
        let value = readings();
        let opts = QueryOptions::new().with_filter_mode(FilterMode::JsonPath);
        let err = query("$.readings[?(@.val > cutoff)]", &value, &opts).unwrap_err();
        assert!(
            matches!(err, QueryError::Eval(EvalError::UnsafeIdentifier(name)) if name == "cutoff")
        );
        let err = query(
            "$.readings[?(@.constructor)]",
            &value,
            &opts,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Eval(EvalError::UnsafeIdentifier(name)) if name == "constructor"
        ));
    }

    #[test]
    fn eval_off_blocks_filters_and_scripts() {
        let value = readings();
        let opts = QueryOptions::new()
            .with_filter_mode(FilterMode::JsonPath)
            .with_eval(EvalPolicy::Off);
        let err = query("$.readings[?(@.val > 1)]", &value, &opts).unwrap_err();
        assert!(matches!(err, QueryError::Eval(EvalError::EvalDisabled)));
        let err = query("$.readings[(1+1)]", &value, &opts).unwrap_err();
        assert!(matches!(err, QueryError::Eval(EvalError::EvalDisabled)));
    }

    #[test]
    fn prevent_eval_wins_over_policy() {
        let value = readings();
        let opts = native().with_prevent_eval(true);
        let err = query("$.readings[?(@.val > 1)]", &value, &opts).unwrap_err();
        assert!(matches!(err, QueryError::Eval(EvalError::EvalDisabled)));
    }

    #[test]
    fn rfc_filters_do_not_need_eval() {
        let value = readings();
        let opts = QueryOptions::new().with_eval(EvalPolicy::Off);
        let result = query("$.readings[?@.val > 40].msg", &value, &opts).unwrap();
        assert_eq!(result.values(), vec!["biz", "bop"]);
    }

    #[test]
    fn candidate_errors_propagate_or_are_ignored() {
        let value = json!({"rows": [{"a": {"b": 1}}, {"c": 2}]});
        let err = query("$.rows[?(@.a.b == 1)]", &value, &native()).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Eval(EvalError::FilterRuntime(_))
        ));
        let opts = native().with_ignore_eval_errors(true);
        let result = query("$.rows[?(@.a.b == 1)]", &value, &opts).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn parent_property_variable_needs_no_tracking() {
        // @parentProperty is the key of the containing node within its own
        // parent, resolved per context even though nothing here tracks
        // locations
        let value = json!({"a": {"b": {"c": {"b": 42, "x": 1}}}});
        let result = query("$.a.b.c[(@parentProperty)]", &value, &native()).unwrap();
        assert_eq!(result.values(), vec![42]);
        let value = json!({"a": {"b": {"k1": 1, "k2": 2}}});
        let result = query(
            "$.a.b[?(@parentProperty == 'b')]",
            &value,
            &native(),
        )
        .unwrap();
        assert_eq!(result.values(), vec![1, 2]);
        let result = query(
            "$.a.b[?(@parentProperty == 'a')]",
            &value,
            &native(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn script_results_become_selectors() {
        let value = json!({"list": [10, 20, 30], "obj": {"pick": "x", "x": 9}});
        let result = query("$.list[(@.length-2)]", &value, &native()).unwrap();
        assert_eq!(result.values(), vec![20]);
        let result = query("$.obj[(@.pick)]", &value, &native()).unwrap();
        assert_eq!(result.values(), vec![9]);
        // non-scalar results select nothing
        let result = query("$.obj[(@.missing)]", &value, &native()).unwrap();
        assert!(result.is_empty());
    }
}

mod xpath {
    use super::*;

    fn xpath_native<'a>() -> QueryOptions<'a> {
        QueryOptions::new()
            .with_filter_mode(FilterMode::XPath)
            .with_eval(EvalPolicy::Native)
    }

    #[test]
    fn filters_test_the_parent_itself() {
        let value = readings();
        // frontier holds the reading objects; each is tested directly
        let result = query(
            "$.readings[*][?(@.val < 40)].msg",
            &value,
            &xpath_native(),
        )
        .unwrap();
        assert_eq!(result.values(), vec!["foo"]);
    }

    #[test]
    fn parent_property_variable_on_the_parent_context() {
        // the tested node is b at depth two; its parentProperty is the key
        // of a within the root, with no location tracking in play
        let value = json!({"a": {"b": {"flag": true}}});
        let result = query(
            "$.a.b[?(@parentProperty == 'a')]",
            &value,
            &xpath_native(),
        )
        .unwrap();
        assert_eq!(result.values(), vec![json!({"flag": true})]);
        let result = query(
            "$.a.b[?(@parentProperty == 'b')]",
            &value,
            &xpath_native(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn contrast_with_child_expansion() {
        let value = json!({"a": {"keep": {"flag": true}, "drop": {"flag": false}}});
        // jsonpath mode expands to children of each frontier node
        let child_mode = QueryOptions::new()
            .with_filter_mode(FilterMode::JsonPath)
            .with_eval(EvalPolicy::Native);
        let result = query("$.a[?(@.flag)]", &value, &child_mode).unwrap();
        assert_eq!(result.values(), vec![json!({"flag": true})]);
        // xpath mode tests the frontier nodes themselves
        let result = query("$.a.keep[?(@.flag)]", &value, &xpath_native()).unwrap();
        assert_eq!(result.values(), vec![json!({"flag": true})]);
    }
}
