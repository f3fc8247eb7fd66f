use super::*;

#[test]
fn text_and_html_replace_content() -> Result<()> {
    let query = query_for("<div id='box'><b>old</b></div>")?;
    let mut boxed = select(&query, "#box")?;

    assert_eq!(boxed.html()?, "<b>old</b>");
    boxed.set_text("1 < 2 & 3")?;
    assert_eq!(boxed.text()?, "1 < 2 & 3");
    assert_eq!(boxed.html()?, "1 &lt; 2 &amp; 3");

    boxed.set_html("<em class='x'>new</em> tail")?;
    assert_eq!(boxed.text()?, "new tail");
    assert_eq!(boxed.child_elements()?.len(), 1);

    boxed.empty()?;
    assert_eq!(boxed.html()?, "");
    assert!(matches!(
        boxed.set_html("<p class='oops"),
        Err(Error::HtmlParse(_))
    ));
    Ok(())
}

#[test]
fn append_and_prepend_take_markup_or_nodes() -> Result<()> {
    let query = query_for("<ul id='list'><li>b</li></ul>")?;
    let mut list = select(&query, "#list")?;

    list.append("<li>c</li><li>d</li>")?.prepend("<li>a</li>")?;
    assert_eq!(list.text()?, "abcd");

    let zero = query.create("li")?;
    let mut last = query.create("li")?;
    last.set_text("z")?;
    list.prepend(&zero)?.append(last.node())?;
    assert_eq!(list.child_elements()?.len(), 6);
    assert!(list.child_element(0)?.same_node(&zero));
    assert_eq!(list.child_element(5)?.text()?, "z");

    let mut empty = query.create("ol")?;
    empty.prepend(Content::Node(zero.node()))?;
    assert!(empty.child_node(0)?.same_node(&zero));
    assert_eq!(list.child_elements()?.len(), 5);
    Ok(())
}

#[test]
fn fragments_move_their_children() -> Result<()> {
    let query = query_for("<div id='host'></div>")?;
    let mut host = select(&query, "#host")?;
    let mut fragment = query.create_fragment()?;
    fragment.append("<span>1</span><span>2</span>")?;

    host.append(&fragment)?;
    assert_eq!(host.html()?, "<span>1</span><span>2</span>");
    assert!(fragment.child_elements()?.is_empty());
    Ok(())
}

#[test]
fn child_indices_are_bounds_checked() -> Result<()> {
    let query = query_for("<div id='box'>text<b>one</b><!-- note --><i>two</i></div>")?;
    let boxed = select(&query, "#box")?;

    assert_eq!(boxed.child_node(0)?.text()?, "text");
    assert_eq!(boxed.child_element(1)?.text()?, "two");
    assert!(matches!(
        boxed.child_node(4),
        Err(Error::OutOfRange { index: 4, len: 4, .. })
    ));
    assert!(matches!(
        boxed.child_element(2),
        Err(Error::OutOfRange { index: 2, len: 2, .. })
    ));
    Ok(())
}

#[test]
fn remove_child_returns_a_fresh_wrapper() -> Result<()> {
    let query = query_for("<div id='box'><p id='a'>a</p><p id='b'>b</p></div><p id='c'></p>")?;
    let mut boxed = select(&query, "#box")?;
    let a = select(&query, "#a")?.node();

    let mut removed = boxed.remove_child(a)?;
    assert!(removed.same_node(&a));
    assert!(!query.document().is_connected(a));
    assert_eq!(removed.event_count(None, None)?, 0);
    removed.set_text("still usable")?;

    let c = select(&query, "#c")?;
    assert!(matches!(boxed.remove_child(&c), Err(Error::Dom(_))));
    Ok(())
}

#[test]
fn insert_before_needs_a_direct_child_reference() -> Result<()> {
    let query = query_for("<ol id='list'><li id='two'>2</li></ol><p><span id='deep'></span></p>")?;
    let mut list = select(&query, "#list")?;
    let two = select(&query, "#two")?;
    let mut one = query.create("li")?;
    one.set_text("1")?;

    list.insert_before(&one, &two)?;
    assert_eq!(list.text()?, "12");

    let deep = select(&query, "#deep")?;
    let extra = query.create("li")?;
    assert!(matches!(list.insert_before(&extra, &deep), Err(Error::Dom(_))));
    Ok(())
}

#[test]
fn cleanup_drops_comments_and_blank_text_but_keeps_nbsp() -> Result<()> {
    let query = query_for(
        "<div id='box'>\n  <!-- c -->\n  <p>\t<span>x</span>\r\n</p>&nbsp;<i> y </i>\n</div>",
    )?;
    let mut boxed = select(&query, "#box")?;
    boxed.cleanup()?;

    assert_eq!(
        boxed.html()?,
        "<p><span>x</span></p>&nbsp;<i> y </i>"
    );
    Ok(())
}

#[test]
fn select_searches_descendants_only() -> Result<()> {
    let query = query_for(
        "<section id='s' class='card'><div class='card'><p class='card'>x</p></div></section>",
    )?;
    let section = select(&query, "#s")?;

    let cards = section.select_all(".card")?;
    assert_eq!(cards.len(), 2);
    assert!(cards.iter().all(|card| !card.same_node(&section)));
    assert_eq!(
        section.select("div > .card")?.map(|p| p.node()),
        query.select("p.card")?.map(|p| p.node())
    );
    assert!(section.select("#s")?.is_none());
    assert!(matches!(
        section.select("div >"),
        Err(Error::UnsupportedSelector(_))
    ));
    Ok(())
}
