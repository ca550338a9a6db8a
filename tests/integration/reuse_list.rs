#![allow(missing_docs)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Once};

use pagelist::types::page::{PageHeader, PageIo, PageKind};
use pagelist::{
    reuse_list, FreeListOptions, GroupId, PageFlag, PageId, PageListError, PageStore, Pager,
    PagerOptions, ReuseBag, ReuseList, ReuseListImpl, INDEX_PARTITION,
};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

const GROUP: GroupId = GroupId(3);

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagelist=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

fn open(dir: &Path, cache_pages: usize) -> (Arc<Pager>, ReuseListImpl<Pager>) {
    init_tracing();
    let pager = Arc::new(
        Pager::open(
            dir,
            PagerOptions {
                page_size: 1024,
                ..PagerOptions::default()
            },
        )
        .expect("open pager"),
    );
    let meta = pager
        .allocate_page(GROUP, INDEX_PARTITION, PageFlag::Index)
        .expect("allocate meta page");
    let mut options = FreeListOptions::named("reuse", GROUP);
    options.cache_pages_per_bucket = cache_pages;
    let list = reuse_list(Arc::clone(&pager), options, meta, true).expect("create reuse list");
    (pager, list)
}

fn index_page(index: u32) -> PageId {
    PageId::new(INDEX_PARTITION, PageFlag::Index, index)
}

/// Allocates index pages until `index` exists.
fn allocate_through(pager: &Pager, index: u32) {
    while pager.partition_len(GROUP, INDEX_PARTITION).unwrap() <= u64::from(index) {
        pager
            .allocate_page(GROUP, INDEX_PARTITION, PageFlag::Index)
            .unwrap();
    }
}

#[test]
fn recycles_ten_eleven_twelve() {
    for cache_pages in [0, 64] {
        let dir = tempdir().unwrap();
        let (pager, list) = open(dir.path(), cache_pages);
        allocate_through(&pager, 12);

        let mut bag: ReuseBag = [10, 11, 12].into_iter().map(index_page).collect();
        list.add_for_recycle(&mut bag).unwrap();
        assert!(bag.is_empty());
        assert_eq!(list.recycled_pages_count(), 3);

        let mut taken = HashSet::new();
        for _ in 0..3 {
            let page = list.take_recycled_page().unwrap().expect("page available");
            assert!(taken.insert(page), "page {page} handed out twice");
        }
        let expected: HashSet<PageId> = [10, 11, 12].into_iter().map(index_page).collect();
        assert_eq!(taken, expected);
        assert_eq!(list.take_recycled_page().unwrap(), None);
        assert_eq!(list.recycled_pages_count(), 0);

        let before = list.stats().allocated_no_reuse;
        let fresh = list.take_or_allocate(0).unwrap();
        assert_eq!(list.stats().allocated_no_reuse, before + 1);
        assert_eq!(fresh, index_page(13));
    }
}

#[test]
fn only_bucket_zero_exists() {
    let dir = tempdir().unwrap();
    let (_pager, list) = open(dir.path(), 0);
    let page = list.allocate_page_no_reuse().unwrap();

    let err = list.put_page(page, 1).unwrap_err();
    assert!(matches!(err, PageListError::InvariantViolation(_)));
    assert!(err.is_fatal());
    assert!(matches!(
        list.take(1),
        Err(PageListError::InvariantViolation(_))
    ));
    assert!(matches!(
        list.stored_pages_count(1),
        Err(PageListError::InvariantViolation(_))
    ));

    list.put_page(page, 0).unwrap();
    assert_eq!(list.stored_pages_count(0).unwrap(), 1);
}

#[test]
fn chained_pages_are_stamped_free() {
    let dir = tempdir().unwrap();
    let (pager, list) = open(dir.path(), 0);
    let pages: Vec<PageId> = (0..3)
        .map(|_| list.allocate_page_no_reuse().unwrap())
        .collect();
    list.add_for_recycle(&mut ReuseBag::with_pages(pages.iter().copied()))
        .unwrap();

    for &page in &pages {
        let handle = pager.acquire_page(GROUP, page).unwrap();
        let header = PageHeader::decode(handle.read().data()).unwrap();
        assert_eq!(header.kind, PageKind::Free);
        assert_eq!(header.list_tag, 0);
        assert_eq!(header.page_id, page);
    }

    let taken = list.take_recycled_page().unwrap().unwrap();
    let handle = pager.acquire_page(GROUP, taken).unwrap();
    let header = PageHeader::decode(handle.read().data()).unwrap();
    assert!(!header.is_listed());
    assert!(header.next_free.is_none());
}

#[test]
fn rejects_bad_bags() {
    let dir = tempdir().unwrap();
    let (_pager, list) = open(dir.path(), 0);
    let page = list.allocate_page_no_reuse().unwrap();

    let mut dup = ReuseBag::with_pages([page, page]);
    assert!(matches!(
        list.add_for_recycle(&mut dup),
        Err(PageListError::Invalid(_))
    ));
    assert_eq!(dup.len(), 2);

    let mut none = ReuseBag::with_pages([PageId::NONE]);
    assert!(matches!(
        list.add_for_recycle(&mut none),
        Err(PageListError::Invalid(_))
    ));
    assert_eq!(list.recycled_pages_count(), 0);

    list.add_for_recycle(&mut ReuseBag::new()).unwrap();
    assert_eq!(list.recycled_pages_count(), 0);
}

#[test]
fn relisting_a_held_page_is_refused() {
    for cache_pages in [0, 64] {
        let dir = tempdir().unwrap();
        let (_pager, list) = open(dir.path(), cache_pages);
        let page = list.allocate_page_no_reuse().unwrap();
        list.put_page(page, 0).unwrap();

        let mut again = ReuseBag::with_pages([page]);
        let err = list.add_for_recycle(&mut again).unwrap_err();
        assert!(matches!(err, PageListError::InvariantViolation(_)));
        assert_eq!(again.len(), 1, "refused page stays in the bag");
        assert_eq!(list.recycled_pages_count(), 1);

        list.save_metadata().unwrap();
        let err = list.add_for_recycle(&mut again).unwrap_err();
        assert!(matches!(err, PageListError::InvariantViolation(_)));
        assert_eq!(list.recycled_pages_count(), 1);

        assert_eq!(list.take_recycled_page().unwrap(), Some(page));
        assert_eq!(list.take_recycled_page().unwrap(), None);
    }
}

#[test]
fn init_recycled_page_rotates_and_formats() {
    let dir = tempdir().unwrap();
    let (pager, list) = open(dir.path(), 0);
    let page = list.allocate_page_no_reuse().unwrap();
    list.put_page(page, 0).unwrap();
    let taken = list.take_recycled_page().unwrap().unwrap();

    let io = PageIo::new(PageKind::BTreeLeaf, 1).unwrap();
    let first = list.init_recycled_page(taken, PageFlag::Data, io).unwrap();
    assert_eq!(first.effective(), page.effective());
    assert_eq!(first.flag(), Some(PageFlag::Data));
    assert_eq!(first.rotation(), 1);

    let handle = pager.acquire_page(GROUP, first).unwrap();
    let header = PageHeader::decode(handle.read().data()).unwrap();
    assert_eq!(header.kind, PageKind::BTreeLeaf);
    assert_eq!(header.page_id, first);
    drop(handle);

    // A second cycle through the list bumps the rotation again.
    list.put_page(first, 0).unwrap();
    let taken = list.take_recycled_page().unwrap().unwrap();
    let second = list
        .init_recycled_page(taken, PageFlag::Index, PageIo::latest(PageKind::BTreeInner))
        .unwrap();
    assert_eq!(second.rotation(), 2);
    assert_eq!(second.flag(), Some(PageFlag::Index));
}

#[test]
fn destroyed_list_rejects_operations() {
    let dir = tempdir().unwrap();
    let (pager, list) = open(dir.path(), 64);
    let pages: Vec<PageId> = (0..4)
        .map(|_| list.allocate_page_no_reuse().unwrap())
        .collect();
    list.add_for_recycle(&mut ReuseBag::with_pages(pages.iter().copied()))
        .unwrap();

    assert_eq!(list.destroy().unwrap(), 5);
    for page in pages {
        assert!(pager.is_freed(GROUP, page));
    }
    assert!(pager.is_freed(GROUP, list.meta_page_id()));

    assert!(matches!(list.destroy(), Err(PageListError::Invalid(_))));
    assert!(matches!(
        list.take_recycled_page(),
        Err(PageListError::Invalid(_))
    ));
    assert!(matches!(
        list.add_for_recycle(&mut ReuseBag::new()),
        Err(PageListError::Invalid(_))
    ));
    assert!(matches!(
        list.allocate_page_no_reuse(),
        Err(PageListError::Invalid(_))
    ));
}
