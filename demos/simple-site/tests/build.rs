use std::fs;

use composer::{BuildOptions, Responder};
use simple_site::{content_dir, site_index};

#[test]
fn test_demo_builds() {
    let index = site_index(content_dir()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = composer::build(
        &index,
        &BuildOptions {
            build_path: dir.path().to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap();

    let mut urls: Vec<_> = output.pages.iter().map(|page| page.url.as_str()).collect();
    urls.sort();
    assert_eq!(urls, vec!["/", "/about", "/post/hello-world", "/post/second-post"]);

    let post = fs::read_to_string(dir.path().join("post/hello-world/index.html")).unwrap();
    assert!(post.contains("<title>Hello, world | Simple Site</title>"));
    assert!(post.contains("<strong>first</strong>"));
    assert!(post.contains("<time>2024-03-01</time>"));
    assert!(post.contains(r#"<a href="/about">About</a>"#));
    assert!(!post.contains("title: Hello"));

    assert!(dir.path().join("static/style.css").exists());
    assert!(!dir.path().join("_nav").exists());
}

#[test]
fn test_demo_serves_what_it_builds() {
    let index = site_index(content_dir()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    composer::build(
        &index,
        &BuildOptions {
            build_path: dir.path().to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap();

    let responder = Responder::new(&index);
    for (path, file) in [
        ("/", "index.html"),
        ("/about", "about/index.html"),
        ("/post/second-post/", "post/second-post/index.html"),
        ("/static/style.css", "static/style.css"),
    ] {
        let response = responder.respond(path);
        assert_eq!(response.status, 200, "{path}");
        assert_eq!(response.body, fs::read(dir.path().join(file)).unwrap(), "{path}");
    }
}
