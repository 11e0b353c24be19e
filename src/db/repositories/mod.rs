mod cache_entries;
