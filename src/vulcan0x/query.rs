use serde_json::{Map, Value};

/// A read against one vulcan0x view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub view: String,                // View name, e.g. tradesAggregated.
    pub options: Map<String, Value>, // View arguments rendered before the filter.
    pub filter: Value,               // Postgraphile filter object.
    pub fields: Vec<String>,         // Columns requested per node.
    pub order_by: Option<String>,    // Ordering enum, e.g. DATE_ASC.
}

impl ViewQuery {
    /// Renders the GraphQL document sent to the data service.
    pub fn to_graphql(&self) -> String {
        let mut args: Vec<String> = self
            .options
            .iter()
            .map(|(k, v)| format!("{}: {}", k, graphql_literal(v)))
            .collect();
        if !self.filter.is_null() {
            args.push(format!("filter: {}", graphql_literal(&self.filter)));
        }
        if let Some(order) = &self.order_by {
            args.push(format!("orderBy: [{}]", order));
        }

        let selection = format!("nodes {{ {} }}", self.fields.join(" "));
        if args.is_empty() {
            format!("{{ {} {{ {} }} }}", self.view, selection)
        } else {
            format!("{{ {}({}) {{ {} }} }}", self.view, args.join(", "), selection)
        }
    }
}

// GraphQL input literals look like JSON without quoted object keys.
fn graphql_literal(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, graphql_literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(graphql_literal).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn renders_arguments_filter_and_fields() {
        let query = ViewQuery {
            view: "tradesAggregated".into(),
            options: options(json!({ "timeUnit": "day", "tzOffset": { "minutes": 120 } })),
            filter: json!({
                "market": { "equalTo": "WETHDAI" },
                "date": { "greaterThan": "2018-05-01T22:00:00.000Z" },
            }),
            fields: vec!["date".into(), "open".into()],
            order_by: None,
        };

        assert_eq!(
            query.to_graphql(),
            "{ tradesAggregated(timeUnit: \"day\", tzOffset: {minutes: 120}, \
             filter: {date: {greaterThan: \"2018-05-01T22:00:00.000Z\"}, market: {equalTo: \"WETHDAI\"}}) \
             { nodes { date open } } }"
        );
    }

    #[test]
    fn renders_order_and_bare_view() {
        let ordered = ViewQuery {
            view: "allTrades".into(),
            options: Map::new(),
            filter: Value::Null,
            fields: vec!["price".into()],
            order_by: Some("TIME_DESC".into()),
        };
        assert_eq!(
            ordered.to_graphql(),
            "{ allTrades(orderBy: [TIME_DESC]) { nodes { price } } }"
        );

        let bare = ViewQuery {
            order_by: None,
            ..ordered
        };
        assert_eq!(bare.to_graphql(), "{ allTrades { nodes { price } } }");
    }

    #[test]
    fn escapes_string_literals() {
        assert_eq!(graphql_literal(&json!(["a\"b", true, null])), "[\"a\\\"b\", true, null]");
    }
}
