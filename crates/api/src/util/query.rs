/// Looks up the first value of `key` in a raw query string.
pub fn find_param<'q>(query: &'q str, key: &str) -> Option<&'q str> {
    query.split('&').find_map(|chunk| {
        let (name, value) = chunk.split_once('=')?;
        (name == key).then_some(value)
    })
}

/// Parses an optional query parameter, treating an empty value as absent.
pub fn parse_param<T: core::str::FromStr>(query: &str, key: &str) -> Result<Option<T>, T::Err> {
    find_param(query, key).filter(|value| !value.is_empty()).map(str::parse).transpose()
}
