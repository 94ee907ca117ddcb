/*!

This is the long-form manual for `ballot_audit` and `ballotaudit`.

## How a ballot is read

The ballots are printed with a row of black registration marks along the top
edge and a column of marks along the left edge. In the reference layout there
are 4 marks in the top row and 38 in the left column.

1. The scanned page is shrunk by `scaleFactor` (default 0.125).
2. Every connected area of fully black pixels is a candidate mark.
3. The top row is made of the marks whose top edge is within `tiltAllowance`
   pixels of the highest mark, ignoring the marks that start in the top
   `ignoreTopMargin` pixels. The left column is found the same way with
   `ignoreLeftMargin`.
4. If the number of marks does not match the layout, the ballot is counted as
   `badBoxes` and nothing else is measured.
5. Otherwise the bubble of each candidate is found at the crossing of its
   mark in the left column and its mark in the top row, and its darkness (the
   sum of `255 - intensity` over the bubble) is measured.

## Outcomes

With two thresholds `low < high`, the first matching rule wins:

| outcome    | rule                                                  |
|------------|-------------------------------------------------------|
| `badBoxes` | the registration marks were not found                 |
| `fuzzy`    | at least one bubble has a darkness in `[low, high)`    |
| `multiple` | more than one bubble is strictly darker than `high`   |
| `blank`    | no bubble is strictly darker than `high`              |
| candidate  | exactly one bubble is strictly darker than `high`     |

A darkness equal to `high` is neither fuzzy nor marked.

## Input formats

### Ballot batches

The input directory contains one file per batch:
- `.zip` archives: every entry whose name ends with the ballot suffix
  (`F.pbm`, the front page, by default) is a ballot. Other entries are skipped.
- `.pbm` files: a batch with a single ballot.

The name of the file without its extension is the name of the precinct, for
example `Madison City Wards 1-3.zip`.

### Official results

A CSV or Excel (.xlsx) file with a header row. The `Precinct` column contains
the official name of the precinct (`C Madison Wd 12`), every other column is a
candidate. Empty cells count as 0.

```text
Precinct,clinton,trump,stein
C Madison Wd 1,410,120,12
C Madison Wd 2,388,140,
```

## Reconciliation

Audited precinct names list the wards they cover: `Madison City Wards 1-3, 5`
covers the city wards 1, 2, 3 and 5 (`&` can also be used as a separator).
Town precincts (`Madison Town Wards 10`) are skipped. For every city precinct
the official rows `C Madison Wd 1`, `C Madison Wd 2`, ... are summed.

A ward may be claimed by a single precinct. A ward claimed twice, a ward
outside of the known wards (`wardUniverse`) or a precinct name that cannot be
parsed stops the reconciliation. The wards that no precinct claimed are listed
in the output.

## Configuration

All the keys are optional.

```text
{
  "scaleFactor": 0.125,
  "ignoreLeftMargin": 5,
  "ignoreTopMargin": 5,
  "tiltAllowance": 8,
  "expectedHorizontalMarks": 4,
  "expectedVerticalMarks": 38,
  "lowThreshold": 1200,
  "highThreshold": 1800,
  "ballotSuffix": "F.pbm",
  "municipality": "Madison",
  "wardUniverse": { "first": 1, "last": 138 },
  "candidates": [
    { "name": "clinton", "verticalIndex": 21, "horizontalIndex": 1 }
  ]
}
```

When `candidates` is missing, the candidates of the reference layout are used.
The thresholds can also be given on the command line with `--low` and
`--high`, which take precedence over the file.

 */
