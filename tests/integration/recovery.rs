#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use pagelist::freelist::meta;
use pagelist::types::page::{header, PageIo, PageKind, UNLISTED};
use pagelist::{
    reuse_list, FreeList, FreeListOptions, GroupId, PageFlag, PageId, PageListError, PageStore,
    Pager, PagerOptions, ReuseBag, ReuseList, SizeClassPolicy, INDEX_PARTITION,
};
use tempfile::tempdir;

const GROUP: GroupId = GroupId(2);
const META: PageId = PageId::new(INDEX_PARTITION, PageFlag::Index, 0);

fn open_pager(dir: &Path, page_size: u32) -> Arc<Pager> {
    Arc::new(
        Pager::open(
            dir,
            PagerOptions {
                page_size,
                ..PagerOptions::default()
            },
        )
        .unwrap(),
    )
}

fn open_free_list(
    pager: &Arc<Pager>,
    buckets: usize,
    init_new: bool,
) -> pagelist::Result<Arc<FreeList<Pager>>> {
    if init_new {
        let meta = pager.allocate_page(GROUP, INDEX_PARTITION, PageFlag::Index)?;
        assert_eq!(meta, META);
    }
    let policy = SizeClassPolicy::new(pager.page_size(), buckets)?;
    let list = Arc::new(FreeList::new(
        Arc::clone(pager),
        policy,
        FreeListOptions::named("data", GROUP),
        META,
        init_new,
    )?);
    list.register_with_checkpointer();
    Ok(list)
}

fn data_page(pager: &Pager) -> PageId {
    let page = pager.allocate_page(GROUP, 0, PageFlag::Data).unwrap();
    let handle = pager.acquire_page(GROUP, page).unwrap();
    let mut guard = handle.write();
    PageIo::latest(PageKind::Data)
        .init_new_page(guard.data_mut(), page, pager.page_size())
        .unwrap();
    page
}

fn drain<L: std::ops::Deref<Target = FreeList<Pager>>>(
    list: &L,
    buckets: usize,
) -> BTreeMap<usize, HashSet<PageId>> {
    (0..buckets)
        .map(|bucket| {
            let mut pages = HashSet::new();
            while let Some(page) = list.take(bucket).unwrap() {
                assert!(pages.insert(page));
            }
            (bucket, pages)
        })
        .collect()
}

#[test]
fn reopened_list_matches_persisted_state() {
    let dir = tempdir().unwrap();
    let buckets = 6;
    let mut expected: BTreeMap<usize, HashSet<PageId>> =
        (0..buckets).map(|b| (b, HashSet::new())).collect();
    {
        let pager = open_pager(dir.path(), 4096);
        let list = open_free_list(&pager, buckets, true).unwrap();
        for i in 0..60usize {
            let page = data_page(&pager);
            let bucket = i % buckets;
            list.put_page(page, bucket).unwrap();
            expected.get_mut(&bucket).unwrap().insert(page);
        }
        for bucket in [0, 2, 2, 5] {
            let page = list.take(bucket).unwrap().unwrap();
            assert!(expected.get_mut(&bucket).unwrap().remove(&page));
        }
        pager.checkpoint().unwrap();
    }

    let pager = open_pager(dir.path(), 4096);
    let list = open_free_list(&pager, buckets, false).unwrap();
    for (bucket, pages) in &expected {
        assert_eq!(
            list.stored_pages_count(*bucket).unwrap(),
            pages.len() as u64,
            "bucket {bucket}"
        );
    }
    assert_eq!(drain(&list, buckets), expected);
}

#[test]
fn cached_pages_survive_save_and_restart() {
    let dir = tempdir().unwrap();
    let pages: Vec<PageId>;
    {
        let pager = open_pager(dir.path(), 1024);
        pager
            .allocate_page(GROUP, INDEX_PARTITION, PageFlag::Index)
            .unwrap();
        let list = reuse_list(
            Arc::clone(&pager),
            FreeListOptions::named("reuse", GROUP),
            META,
            true,
        )
        .unwrap();
        pages = (0..5)
            .map(|_| list.allocate_page_no_reuse().unwrap())
            .collect();
        list.add_for_recycle(&mut ReuseBag::with_pages(pages.iter().copied()))
            .unwrap();
        assert_eq!(list.stats().buckets[0].cached_pages, 5);

        list.save_metadata().unwrap();
        assert_eq!(list.stats().buckets[0].cached_pages, 0);
        assert_eq!(list.recycled_pages_count(), 5);
        pager.checkpoint().unwrap();
    }

    let pager = open_pager(dir.path(), 1024);
    let list = reuse_list(
        Arc::clone(&pager),
        FreeListOptions::named("reuse", GROUP),
        META,
        false,
    )
    .unwrap();
    assert_eq!(list.recycled_pages_count(), 5);
    let mut taken = HashSet::new();
    while let Some(page) = list.take_recycled_page().unwrap() {
        taken.insert(page);
    }
    assert_eq!(taken, pages.into_iter().collect());
}

#[test]
fn checkpoint_persists_registered_list() {
    let dir = tempdir().unwrap();
    {
        let pager = open_pager(dir.path(), 4096);
        let list = open_free_list(&pager, 3, true).unwrap();
        let page = data_page(&pager);
        list.put_page(page, 1).unwrap();
        assert_eq!(list.stats().buckets[1].cached_pages, 1);
        let writes = list.stats().metadata_writes;
        pager.checkpoint().unwrap();
        assert_eq!(list.stats().metadata_writes, writes + 1);
        assert_eq!(list.stats().buckets[1].cached_pages, 0);
    }
    let pager = open_pager(dir.path(), 4096);
    let list = open_free_list(&pager, 3, false).unwrap();
    assert_eq!(list.stored_pages_count(1).unwrap(), 1);
}

#[test]
fn metadata_spills_over_several_pages() {
    let dir = tempdir().unwrap();
    let page_size = 256;
    let per_page = meta::entries_per_page(page_size);
    let buckets = per_page * 2 + 3;
    let mut expected: BTreeMap<usize, HashSet<PageId>> = BTreeMap::new();
    {
        let pager = open_pager(dir.path(), page_size);
        let list = open_free_list(&pager, buckets, true).unwrap();
        assert_eq!(pager.partition_len(GROUP, INDEX_PARTITION).unwrap(), 3);
        for bucket in (0..buckets).step_by(4) {
            let page = data_page(&pager);
            list.put_page(page, bucket).unwrap();
            expected.entry(bucket).or_default().insert(page);
        }
        pager.checkpoint().unwrap();
    }

    let pager = open_pager(dir.path(), page_size);
    let list = open_free_list(&pager, buckets, false).unwrap();
    let stats = list.stats();
    assert_eq!(stats.buckets.len(), buckets);
    assert!(stats.buckets.iter().all(|b| b.stripes >= 1));
    let mut recovered = drain(&list, buckets);
    recovered.retain(|_, pages| !pages.is_empty());
    assert_eq!(recovered, expected);
}

#[test]
fn untagged_stripe_head_is_corruption() {
    let dir = tempdir().unwrap();
    let pager = open_pager(dir.path(), 4096);
    let pages: Vec<PageId> = {
        let list = open_free_list(&pager, 3, true).unwrap();
        let pages: Vec<PageId> = (0..3).map(|_| data_page(&pager)).collect();
        list.put(&mut ReuseBag::with_pages(pages.iter().copied()), 1)
            .unwrap();
        list.save_metadata().unwrap();
        pages
    };

    // Whichever page heads the chain, it no longer carries its bucket tag.
    for &page in &pages {
        let handle = pager.acquire_page(GROUP, page).unwrap();
        let mut guard = handle.write();
        guard.data_mut()[header::LIST_TAG].copy_from_slice(&UNLISTED.to_be_bytes());
    }

    let err = open_free_list(&pager, 3, false).unwrap_err();
    assert!(matches!(err, PageListError::Corruption(_)), "{err:?}");
    assert!(err.is_fatal());
}

#[test]
fn bucket_count_mismatch_is_corruption() {
    let dir = tempdir().unwrap();
    let pager = open_pager(dir.path(), 4096);
    drop(open_free_list(&pager, 3, true).unwrap());
    let err = open_free_list(&pager, 4, false).unwrap_err();
    assert!(matches!(err, PageListError::Corruption(_)));
}

#[test]
fn destroy_releases_everything() {
    let dir = tempdir().unwrap();
    let pager = open_pager(dir.path(), 256);
    let per_page = meta::entries_per_page(256);
    let buckets = per_page + 1;
    let list = open_free_list(&pager, buckets, true).unwrap();
    let meta_pages = pager.partition_len(GROUP, INDEX_PARTITION).unwrap();
    assert_eq!(meta_pages, 2);

    let pages: Vec<PageId> = (0..20).map(|_| data_page(&pager)).collect();
    for (i, &page) in pages.iter().enumerate() {
        list.put_page(page, i % 3).unwrap();
    }
    list.save_metadata().unwrap();
    let extra = data_page(&pager);
    list.put_page(extra, 0).unwrap();

    let released = list.destroy().unwrap();
    assert_eq!(released, pages.len() as u64 + 1 + meta_pages);
    for page in pages.iter().chain([&extra]) {
        assert!(pager.is_freed(GROUP, *page));
    }
    assert!(pager.is_freed(GROUP, META));
    assert_eq!(list.total_pages_count(), 0);
    assert!(matches!(list.destroy(), Err(PageListError::Invalid(_))));
}
