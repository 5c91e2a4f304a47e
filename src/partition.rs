use crate::schedule::ScheduleError;

/// Number of items each day receives when `total` items are spread over
/// `days` days. The first `total % days` days carry one extra item.
pub fn day_sizes(total: usize, days: usize) -> Result<Vec<usize>, ScheduleError> {
    if days == 0 {
        return Err(ScheduleError::ZeroDays);
    }
    let base = total / days;
    let remainder = total % days;
    Ok((1..=days)
        .map(|day| if day <= remainder { base + 1 } else { base })
        .collect())
}

/// Split `items` into exactly `days` contiguous slices whose sizes differ by
/// at most one. Concatenating the slices yields `items` unchanged.
pub fn partition<T>(items: &[T], days: usize) -> Result<Vec<&[T]>, ScheduleError> {
    let sizes = day_sizes(items.len(), days)?;
    let mut slices = Vec::with_capacity(days);
    let mut start = 0;
    for size in sizes {
        let end = start + size;
        slices.push(&items[start..end]);
        start = end;
    }
    Ok(slices)
}

/// Owning variant of [`partition`]; moves every item into its day bucket
/// without cloning.
pub fn partition_owned<T>(items: Vec<T>, days: usize) -> Result<Vec<Vec<T>>, ScheduleError> {
    let sizes = day_sizes(items.len(), days)?;
    let mut iter = items.into_iter();
    Ok(sizes
        .into_iter()
        .map(|size| iter.by_ref().take(size).collect())
        .collect())
}
