/// Picks the artwork URL shown next to a track: the placeholder when the
/// track has none, a 250px SoundCloud rendition instead of the `-large`
/// thumbnail, and the high-quality variant of YouTube's default image.
pub fn artwork_url(raw: Option<&str>, placeholder: &str) -> String {
    let Some(url) = raw.filter(|u| !u.is_empty()) else {
        return placeholder.to_string();
    };

    if url.contains("-large") {
        url.replacen("-large.", "-t250x250.", 1)
    } else if url.contains("default.jpg") {
        url.replacen("default.jpg", "hqdefault.jpg", 1)
    } else {
        url.to_string()
    }
}
