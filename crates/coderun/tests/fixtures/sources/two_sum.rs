fn solve(input: &Value) -> Value {
    let target = input["target"].as_i64().unwrap_or(0);
    let mut seen = HashMap::new();
    for (i, n) in input["nums"].as_array().into_iter().flatten().enumerate() {
        let n = n.as_i64().unwrap_or(0);
        if let Some(&j) = seen.get(&(target - n)) {
            return Value::from(vec![j, i]);
        }
        seen.insert(n, i);
    }
    Value::from(Vec::<i64>::new())
}
